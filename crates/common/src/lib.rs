//! Common types for the OAuth relay workspace

mod error;
mod secret;
mod token;

pub use error::{Error, Result};
pub use secret::Secret;
pub use token::random_token;
