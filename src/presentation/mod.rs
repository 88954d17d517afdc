//! Server-side views rendered with askama.

pub mod views;
