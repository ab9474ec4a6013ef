//! Core domain types shared by ingestion and broadcast.

mod payload;

pub use payload::*;
