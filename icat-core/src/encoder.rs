//! Raw pixel transmission
//!
//! Encodes a decoded image as `f=32` RGBA pixels, zlib compressed.
//! See: https://sw.kovidgoyal.net/kitty/graphics-protocol/#display-images-on-screen

use image::{DynamicImage, ImageBuffer, Rgba};
use std::io::{self, Write};
use std::ops::Deref;

use crate::protocol::{write_header, Format};
use crate::zlib::ZlibPayloadWriter;

/// Pixels are batched up to this many bytes before each write
const SCRATCH_SIZE: usize = 16 * 1024;

/// Rectangle covered by an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    /// Bounds of a `width` x `height` image anchored at the origin
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Exclusive end coordinates, or `None` if they do not fit in `u32`
    pub fn end(&self) -> Option<(u32, u32)> {
        Some((
            self.x.checked_add(self.width)?,
            self.y.checked_add(self.height)?,
        ))
    }
}

/// Read access to the pixels of an image
pub trait PixelSource {
    /// Rectangle of valid coordinates for [`rgba16`](Self::rgba16)
    fn bounds(&self) -> Bounds;

    /// Non-premultiplied RGBA at absolute coordinates, each channel in 0..=65535
    fn rgba16(&self, x: u32, y: u32) -> [u16; 4];
}

/// Widen an 8-bit channel so that `>> 8` gives the same byte back
fn widen(v: u8) -> u16 {
    u16::from(v) * 257
}

impl PixelSource for DynamicImage {
    fn bounds(&self) -> Bounds {
        Bounds::from_size(self.width(), self.height())
    }

    fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
        match self {
            DynamicImage::ImageRgba16(img) => img.get_pixel(x, y).0,
            DynamicImage::ImageRgb16(img) => {
                let [r, g, b] = img.get_pixel(x, y).0;
                [r, g, b, u16::MAX]
            }
            DynamicImage::ImageLumaA16(img) => {
                let [l, a] = img.get_pixel(x, y).0;
                [l, l, l, a]
            }
            DynamicImage::ImageLuma16(img) => {
                let [l] = img.get_pixel(x, y).0;
                [l, l, l, u16::MAX]
            }
            _ => {
                use image::GenericImageView;
                GenericImageView::get_pixel(self, x, y).0.map(widen)
            }
        }
    }
}

impl<C: Deref<Target = [u8]>> PixelSource for ImageBuffer<Rgba<u8>, C> {
    fn bounds(&self) -> Bounds {
        Bounds::from_size(self.width(), self.height())
    }

    fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
        self.get_pixel(x, y).0.map(widen)
    }
}

impl<C: Deref<Target = [u16]>> PixelSource for ImageBuffer<Rgba<u16>, C> {
    fn bounds(&self) -> Bounds {
        Bounds::from_size(self.width(), self.height())
    }

    fn rgba16(&self, x: u32, y: u32) -> [u16; 4] {
        self.get_pixel(x, y).0
    }
}

/// Image encoder, writing one transmission per call to [`encode`](Self::encode).
///
/// Buffers and compressor state are reused across calls, so encoding many
/// images through one `Encoder` does not reallocate.
pub struct Encoder<W> {
    zw: ZlibPayloadWriter<W>,
    scratch: [u8; SCRATCH_SIZE],
}

impl<W: Write> Encoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            zw: ZlibPayloadWriter::new(w),
            scratch: [0; SCRATCH_SIZE],
        }
    }

    /// Rebind to a new sink, returning the previous one
    pub fn reset(&mut self, w: W) -> W {
        // The payload writers rewind themselves at the start of each encode
        std::mem::replace(self.zw.get_mut(), w)
    }

    pub fn into_inner(self) -> W {
        self.zw.into_inner()
    }

    /// Encode `img` and write the complete transmission to the sink.
    ///
    /// Bounds reaching past `u32::MAX` are rejected before anything is
    /// written. On any other error the sink is left with a truncated,
    /// unterminated command.
    pub fn encode<I: PixelSource + ?Sized>(&mut self, img: &I) -> io::Result<()> {
        let bounds = img.bounds();
        let (x_end, y_end) = bounds.end().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("image bounds overflow: {:?}", bounds),
            )
        })?;
        log::debug!("encoding {}x{} RGBA image", bounds.width, bounds.height);

        write_header(self.zw.get_mut(), Format::Rgba, bounds.width, bounds.height)?;
        self.zw.restart()?;

        // Multiple of 4 (RGBA)
        let pixels = u64::from(bounds.width) * u64::from(bounds.height);
        let cap = usize::try_from(pixels.saturating_mul(4))
            .unwrap_or(usize::MAX)
            .min(SCRATCH_SIZE);

        let mut n = 0;
        for y in bounds.y..y_end {
            for x in bounds.x..x_end {
                if n == cap {
                    self.zw.write_all(&self.scratch[..n])?;
                    n = 0;
                }
                // Keep the high byte of each 16-bit channel
                let [r, g, b, a] = img.rgba16(x, y).map(|c| (c >> 8) as u8);
                self.scratch[n..n + 4].copy_from_slice(&[r, g, b, a]);
                n += 4;
            }
        }

        self.zw.write_all(&self.scratch[..n])?;
        self.zw.close()
    }
}

/// Encode `img` as one transmission on `w`
pub fn write_image<W: Write, I: PixelSource + ?Sized>(w: W, img: &I) -> io::Result<()> {
    Encoder::new(w).encode(img)
}

/// Like [`write_image`], followed by a newline
pub fn writeln_image<W: Write, I: PixelSource + ?Sized>(mut w: W, img: &I) -> io::Result<()> {
    write_image(&mut w, img)?;
    w.write_all(b"\n")
}
