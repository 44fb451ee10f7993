pub mod client;
pub mod error;
pub mod message;
pub mod operation;
pub mod validation;
