//! Image file transcoding
//!
//! Turns an image file of any supported format into a transmission. PNG
//! files are forwarded as-is (`f=100`): they are already compressed, and
//! the terminal decodes them itself. Everything else is decoded to pixels
//! and sent through the [`Encoder`](crate::encoder::Encoder).
//! See: https://sw.kovidgoyal.net/kitty/graphics-protocol/#png-data

use image::error::{ImageError, ImageFormatHint, UnsupportedError};
use image::{ImageFormat, ImageReader};
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::encoder::write_image;
use crate::error::TranscodeError;
use crate::payload::PayloadWriter;
use crate::protocol::{write_header, Format, CHUNK_RAW_SIZE};
use crate::rewind::Rewind;

/// Transcode the image file read from `r` into one transmission on `w`.
///
/// Supported input formats depend on the enabled decoder features.
pub fn transcode<W: Write, R: Read>(w: W, r: R) -> Result<(), TranscodeError> {
    run(w, r, None)
}

/// Like [`transcode`], prefixing decode errors with `name`
pub fn transcode_named<W: Write, R: Read>(w: W, r: R, name: &str) -> Result<(), TranscodeError> {
    run(w, r, Some(name))
}

fn run<W: Write, R: Read>(mut w: W, r: R, name: Option<&str>) -> Result<(), TranscodeError> {
    let mut input = Rewind::new(r);

    let reader = ImageReader::new(&mut input)
        .with_guessed_format()
        .map_err(|e| TranscodeError::decode(name, ImageError::IoError(e)))?;
    let format = reader.format().ok_or_else(|| {
        TranscodeError::decode(
            name,
            ImageError::Unsupported(UnsupportedError::from(ImageFormatHint::Unknown)),
        )
    })?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| TranscodeError::decode(name, e))?;

    if format == ImageFormat::Png {
        log::debug!(
            "forwarding {}x{} PNG file ({} bytes sniffed)",
            width,
            height,
            input.recorded()
        );
        write_header(&mut w, Format::Png, width, height)?;

        let mut pw = PayloadWriter::new(&mut w);
        forward(input.replay(), &mut pw, name)?;
        pw.close()?;
        return Ok(());
    }

    log::debug!("decoding {}x{} {:?} image", width, height, format);
    input.seek(SeekFrom::Start(0))?;
    let img = ImageReader::with_format(input, format)
        .decode()
        .map_err(|e| TranscodeError::decode(name, e))?;

    write_image(w, &img)?;
    Ok(())
}

/// Copy `r` into `pw`, keeping input failures apart from sink failures
fn forward<R: Read, W: Write>(
    mut r: R,
    pw: &mut PayloadWriter<W>,
    name: Option<&str>,
) -> Result<(), TranscodeError> {
    let mut buf = [0u8; CHUNK_RAW_SIZE];
    loop {
        let n = match r.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TranscodeError::decode(name, ImageError::IoError(e))),
        };
        pw.write_all(&buf[..n])?;
    }
}
