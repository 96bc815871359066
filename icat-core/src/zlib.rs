//! Zlib compression layer over [`PayloadWriter`]
//!
//! See: https://sw.kovidgoyal.net/kitty/graphics-protocol/#compression

use flate2::{Compress, Compression, FlushCompress, Status};
use std::io::{self, Write};

use crate::payload::PayloadWriter;

/// Input is batched up to this size before each compressor call
pub const ZLIB_BUFFER_SIZE: usize = 16 * 1024;

const DEFLATE_OUT_SIZE: usize = 4096;

/// Compresses a payload with zlib and hands the compressed stream to an
/// inner [`PayloadWriter`].
///
/// The compressor state and all buffers are kept between transmissions;
/// [`reset`](Self::reset) and [`restart`](Self::restart) only rewind them.
pub struct ZlibPayloadWriter<W> {
    buffer: [u8; ZLIB_BUFFER_SIZE],
    n: usize,
    out: [u8; DEFLATE_OUT_SIZE],
    compress: Compress,
    pw: PayloadWriter<W>,
}

impl<W: Write> ZlibPayloadWriter<W> {
    /// Create a writer bound to `w`. Nothing is written until
    /// [`restart`](Self::restart) or [`reset`](Self::reset).
    pub fn new(w: W) -> Self {
        Self {
            buffer: [0; ZLIB_BUFFER_SIZE],
            n: 0,
            out: [0; DEFLATE_OUT_SIZE],
            compress: Compress::new(Compression::default(), true),
            pw: PayloadWriter::new(w),
        }
    }

    /// Rebind to `w` and start a new compressed payload on it.
    ///
    /// Returns the previous sink.
    pub fn reset(&mut self, w: W) -> io::Result<W> {
        let old = self.pw.reset(w);
        self.restart()?;
        Ok(old)
    }

    /// Start a new compressed payload on the current sink.
    ///
    /// Writes the `o=z,` key, which must directly follow the metadata keys
    /// of the first chunk.
    pub fn restart(&mut self) -> io::Result<()> {
        self.n = 0;
        self.compress.reset();
        self.pw.restart();
        self.pw.get_mut().write_all(b"o=z,")
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.pw.get_mut()
    }

    pub fn into_inner(self) -> W {
        self.pw.into_inner()
    }

    /// Compress any buffered input, write the zlib trailer, then close the
    /// inner writer.
    ///
    /// The underlying sink is not closed or flushed.
    pub fn close(&mut self) -> io::Result<()> {
        let n = std::mem::take(&mut self.n);
        deflate(
            &mut self.compress,
            &mut self.out,
            &mut self.pw,
            &self.buffer[..n],
            true,
        )?;
        log::trace!(
            "zlib: {} bytes in, {} bytes out",
            self.compress.total_in(),
            self.compress.total_out()
        );
        self.pw.close()
    }
}

impl<W: Write> Write for ZlibPayloadWriter<W> {
    fn write(&mut self, mut buf: &[u8]) -> io::Result<usize> {
        let total = buf.len();
        while !buf.is_empty() {
            if self.n == ZLIB_BUFFER_SIZE {
                deflate(
                    &mut self.compress,
                    &mut self.out,
                    &mut self.pw,
                    &self.buffer,
                    false,
                )?;
                self.n = 0;
            }
            let m = (ZLIB_BUFFER_SIZE - self.n).min(buf.len());
            self.buffer[self.n..self.n + m].copy_from_slice(&buf[..m]);
            self.n += m;
            buf = &buf[m..];
        }
        Ok(total)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.pw.flush()
    }
}

/// Run `input` through the compressor and forward its output to `pw`.
///
/// With `finish`, keeps going until the zlib trailer has been written.
fn deflate<W: Write>(
    compress: &mut Compress,
    out: &mut [u8],
    pw: &mut PayloadWriter<W>,
    mut input: &[u8],
    finish: bool,
) -> io::Result<()> {
    let flush = if finish {
        FlushCompress::Finish
    } else {
        FlushCompress::None
    };
    loop {
        let before_in = compress.total_in();
        let before_out = compress.total_out();
        let status = compress.compress(input, out, flush)?;
        let consumed = (compress.total_in() - before_in) as usize;
        let produced = (compress.total_out() - before_out) as usize;

        input = &input[consumed..];
        pw.write_all(&out[..produced])?;

        match status {
            Status::StreamEnd => return Ok(()),
            _ if consumed == 0 && produced == 0 => {
                if finish {
                    return Err(io::Error::other("zlib stream did not terminate"));
                }
                return Ok(());
            }
            _ if !finish && input.is_empty() && produced < out.len() => return Ok(()),
            _ => {}
        }
    }
}
