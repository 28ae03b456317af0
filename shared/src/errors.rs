//! Shared error types for the test harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Failed to read fixture {path}: {message}")]
    FixtureUnreadable { path: String, message: String },

    #[error("Fixture {path} is not valid YAML: {message}")]
    FixtureMalformed { path: String, message: String },

    #[error("Fixture field missing or empty: {field}")]
    FixtureFieldMissing { field: String },

    #[error("Invalid resource name: {input}")]
    InvalidName { input: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
