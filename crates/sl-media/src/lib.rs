//! sl-media: HLS master playlist generation.
//!
//! The per-quality media playlists are written by ffmpeg during the encode;
//! this crate only models the master playlist that ties the surviving
//! variants together. Generation is pure and deterministic: the same set of
//! succeeded rungs always renders byte-identical output.

mod generator;
mod types;

pub use generator::{generate_master_playlist, master_for_variants, MASTER_FILE};
pub use types::{MasterPlaylist, Variant};
