//! Repository layer for database access.
//!
//! Each store is an object-safe trait so the ingestion gate and the
//! broadcaster can be exercised against in-memory fakes.

pub mod content;
pub mod muted_series;
pub mod subscriber;

pub use content::*;
pub use muted_series::*;
pub use subscriber::*;
