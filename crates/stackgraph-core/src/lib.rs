//! Stackgraph Core - identifiers, property values, and error handling

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::*;
