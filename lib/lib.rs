//! dsgate shared library.

/// Backing filesystem client abstraction.
pub mod backing;
/// Caching primitives for the data path.
pub mod cache;
pub mod config;
pub mod ds;
pub mod export;
pub mod sync;
