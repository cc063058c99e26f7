//! Seekgate-Common: Shared types and utilities.
//!
//! This crate provides common functionality used across seekgate:
//!
//! - **Client identity**: [`ClientId`], the hashed key sessions are tracked under
//! - **Path Utilities**: Resource-name validation and content-type guessing
//! - **Error Handling**: The error taxonomy shared by the engine and the server
//!
//! # Examples
//!
//! ```
//! use seekgate_common::{ClientId, Error, Result};
//! use seekgate_common::paths::is_safe_resource_name;
//!
//! let a = ClientId::from_credential("token-a");
//! assert_eq!(a, ClientId::from_credential("token-a"));
//!
//! assert!(is_safe_resource_name("trailer.mp4"));
//! assert!(!is_safe_resource_name("../secrets"));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("trailer.mp4"))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::*;
