pub mod proc_loader;
pub mod proc_validator;
pub mod projects;
pub mod settings;
