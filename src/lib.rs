//! HTTP page cache for a server-rendered site.
//!
//! Anonymous, cacheable page requests are answered from stored snapshots of
//! earlier responses; content changes clear the store.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
pub mod presentation;
