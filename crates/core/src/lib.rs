//! `tollgate-core`: identifiers and the error taxonomy shared by every crate.
//!
//! This crate has no IO and no knowledge of HTTP or tokens.

pub mod error;
pub mod id;

pub use error::{AppError, ErrCode, FieldError, StoreError};
pub use id::{HomeId, InvalidId, ProductId, UserId};
