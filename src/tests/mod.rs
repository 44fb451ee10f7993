pub mod common;

mod config_validation;
mod credential_validation;
mod error_mapping;
