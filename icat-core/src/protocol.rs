//! Kitty graphics protocol framing
//!
//! Wire constants and the control string that opens a transmission.
//! See: https://sw.kovidgoyal.net/kitty/graphics-protocol/

use std::io::{self, Write};

/// Opens a graphics command: ESC _ G
pub const CHUNK_OPEN: &[u8] = b"\x1b_G";

/// Closes a graphics command: ESC \
pub const CHUNK_CLOSE: &[u8] = b"\x1b\\";

/// Maximum base64 payload carried by one chunk (remote client limit)
pub const CHUNK_ENC_SIZE: usize = 4096;

/// Raw bytes whose base64 expansion fills exactly one chunk
pub const CHUNK_RAW_SIZE: usize = (CHUNK_ENC_SIZE / 4) * 3;

/// Payload format code (`f=` key)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// 32-bit RGBA pixels, 4 bytes per pixel
    Rgba,
    /// A complete PNG file
    Png,
}

impl Format {
    /// Numeric code sent on the wire
    pub fn code(self) -> u32 {
        match self {
            Format::Rgba => 32,
            Format::Png => 100,
        }
    }
}

/// Write the opening escape and the metadata keys of the first chunk.
///
/// The control string is left open with a trailing `,` so that the payload
/// writers can append `o=z,` and `m=<0|1>;`.
///
/// Raw pixels are sent with `t=d` (direct transmission); PNG files are sent
/// without it, as the terminal sniffs the container itself.
pub fn write_header<W: Write + ?Sized>(
    w: &mut W,
    format: Format,
    width: u32,
    height: u32,
) -> io::Result<()> {
    w.write_all(CHUNK_OPEN)?;
    write!(w, "q=1,a=T,f={},s={},v={},", format.code(), width, height)?;
    if format == Format::Rgba {
        w.write_all(b"t=d,")?;
    }
    Ok(())
}
