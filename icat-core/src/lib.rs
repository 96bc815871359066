//! icat core - Kitty graphics protocol encoding
//!
//! This crate turns images into the escape sequences understood by terminals
//! implementing the Kitty graphics protocol:
//! - Base64 chunking of an arbitrary payload stream
//! - Zlib compression of raw pixel payloads
//! - RGBA pixel transmission of decoded images
//! - Transcoding of image files, forwarding PNG files untouched
//! - Configuration for the `icat` command
//!
//! See: https://sw.kovidgoyal.net/kitty/graphics-protocol/

pub mod config;
pub mod encoder;
pub mod error;
pub mod payload;
pub mod protocol;
pub mod rewind;
pub mod transcode;
pub mod zlib;

// Re-export commonly used types
pub use config::Config;
pub use encoder::{write_image, writeln_image, Bounds, Encoder, PixelSource};
pub use error::TranscodeError;
pub use payload::PayloadWriter;
pub use transcode::{transcode, transcode_named};
pub use zlib::ZlibPayloadWriter;
