//! sl-core: the foundation crate for streamladder.
//!
//! Everything the other sl-* crates share lives here: the video id
//! type, the error taxonomy, the quality ladder, application
//! configuration, and the broadcast event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod quality;

pub use error::{Error, Result};
pub use ids::VideoId;
pub use quality::QualityPreset;
