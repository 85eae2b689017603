//! Container-engine log source: frame decoding, per-container streamers,
//! and the coordinator that tracks the live container set.

pub mod filter;
pub mod frame;
pub mod source;
pub(crate) mod streamer;

pub use source::DockerSource;
