//! Identify faces against a curated collection of reference idols.
//!
//! Reference photos live in S3 and are indexed into a Rekognition face
//! collection; every indexed face carries its idol id and image key in the
//! external image id, so the collection alone is enough to rebuild the roster.

pub mod ai;
pub mod alert;
pub mod config;
pub mod context;
pub mod error;
pub mod graphics;
pub mod idol;
pub mod processing;
pub mod roster;

pub use context::Context;
pub use error::{IdolError, Result};
pub use idol::{Idol, ImageLocation};
