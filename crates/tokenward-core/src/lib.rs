//! # tokenward-core
//!
//! Core crate for Tokenward. Contains the unified error system,
//! configuration schemas, the key-value cache trait, typed identifiers,
//! and pagination/sorting types.
//!
//! This crate has **no** internal dependencies on other Tokenward crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, AuthFailure, ErrorKind};
pub use result::AppResult;
