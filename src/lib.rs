pub mod artifact;
pub mod cloud;
pub mod commands;
pub mod config;
pub mod error;
pub mod labels;
pub mod payload;
pub mod state;

pub use error::{Result, SagectlError};
