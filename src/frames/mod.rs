//! Turning fetched envelopes into observation frames and merging them with what is stored.

pub mod error;
pub mod merge;
pub mod normalize;
