//! Core error and randomness plumbing shared by the whole pipeline

pub mod error;
pub mod random;

pub use error::{GenerationError, Result};
