//! Database models.
//!
//! These map directly to the SQLite schema in `migrations/`.

pub mod content;
pub mod muted_series;
pub mod subscriber;

pub use content::*;
pub use muted_series::*;
pub use subscriber::*;
