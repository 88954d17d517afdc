//! Application services: content, sessions and error mapping.

pub mod content;
pub mod error;
pub mod session;
