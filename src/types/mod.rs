//! Core types used throughout the crate.

pub mod message;
pub mod streaming;

pub use message::*;
pub use streaming::*;
