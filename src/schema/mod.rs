//! Proximity webhook wire schema
//!
//! This module defines the JSON shape the platform delivers and the adapter
//! that validates it into the typed delivery model.

mod adapter;
mod wire;

pub use adapter::*;
pub use wire::*;
