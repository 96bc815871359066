//! Base64 chunk writer
//!
//! Turns an arbitrary byte stream into the payload part of a graphics
//! command: base64 encoded, split into chunks of at most 4096 characters,
//! each chunk carrying its own `m=` continuation flag.
//! See: https://sw.kovidgoyal.net/kitty/graphics-protocol/#remote-client

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::io::{self, Write};

use crate::protocol::{CHUNK_CLOSE, CHUNK_ENC_SIZE, CHUNK_OPEN, CHUNK_RAW_SIZE};

/// Writes the payload of one transmission into `W`.
///
/// The caller is expected to have written the opening escape and any
/// metadata keys; this writer appends `m=<0|1>;<base64>` and the escapes
/// between and after chunks. A chunk is only emitted once it is known
/// whether more data follows, so a full staging buffer is held back until
/// the next write or [`close`](Self::close).
pub struct PayloadWriter<W> {
    raw: [u8; CHUNK_RAW_SIZE],
    enc: [u8; CHUNK_ENC_SIZE],
    n: usize,
    w: W,
}

impl<W: Write> PayloadWriter<W> {
    /// Create a writer bound to `w`
    pub fn new(w: W) -> Self {
        Self {
            raw: [0; CHUNK_RAW_SIZE],
            enc: [0; CHUNK_ENC_SIZE],
            n: 0,
            w,
        }
    }

    /// Rebind to a new sink and discard any staged bytes.
    ///
    /// Returns the previous sink.
    pub fn reset(&mut self, w: W) -> W {
        self.n = 0;
        std::mem::replace(&mut self.w, w)
    }

    /// Discard staged bytes, keeping the current sink
    pub fn restart(&mut self) {
        self.n = 0;
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.w
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    /// Number of raw bytes waiting for the next chunk
    pub fn staged(&self) -> usize {
        self.n
    }

    /// Encode the staged bytes and write them out.
    fn encode(&mut self) -> io::Result<()> {
        let len = BASE64
            .encode_slice(&self.raw[..self.n], &mut self.enc)
            .map_err(io::Error::other)?;
        self.n = 0;
        self.w.write_all(&self.enc[..len])
    }

    /// Write the final chunk (`m=0`) and the closing escape.
    ///
    /// The underlying sink is not closed or flushed. No further data may be
    /// written until the writer is reset or restarted.
    pub fn close(&mut self) -> io::Result<()> {
        if self.n == 0 {
            log::trace!("final chunk: empty");
            self.w.write_all(b"m=0;")?;
            return self.w.write_all(CHUNK_CLOSE);
        }
        log::trace!("final chunk: {} raw bytes", self.n);
        self.w.write_all(b"m=0;")?;
        self.encode()?;
        self.w.write_all(CHUNK_CLOSE)
    }
}

impl<W: Write> Write for PayloadWriter<W> {
    fn write(&mut self, mut buf: &[u8]) -> io::Result<usize> {
        let total = buf.len();
        while !buf.is_empty() {
            if self.n == CHUNK_RAW_SIZE {
                log::trace!("chunk: {} raw bytes", self.n);
                self.w.write_all(b"m=1;")?;
                self.encode()?;
                self.w.write_all(CHUNK_CLOSE)?;
                self.w.write_all(CHUNK_OPEN)?;
            }

            let l = (CHUNK_RAW_SIZE - self.n).min(buf.len());
            self.raw[self.n..self.n + l].copy_from_slice(&buf[..l]);
            self.n += l;
            buf = &buf[l..];
        }
        Ok(total)
    }

    /// Flush the sink. Staged bytes stay staged: a chunk can't be emitted
    /// before its continuation flag is known.
    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Split a chunk train into (control string, decoded payload) pairs.
    pub(crate) fn split_chunks(out: &[u8]) -> Vec<(String, Vec<u8>)> {
        let text = std::str::from_utf8(out).unwrap();
        let text = text.strip_prefix("\x1b_G").unwrap();
        let text = text.strip_suffix("\x1b\\").unwrap();
        text.split("\x1b\\\x1b_G")
            .map(|chunk| {
                let (control, payload) = chunk.split_once(';').unwrap();
                (control.to_string(), BASE64.decode(payload).unwrap())
            })
            .collect()
    }

    fn payload(chunks: &[(String, Vec<u8>)]) -> Vec<u8> {
        chunks.iter().flat_map(|(_, p)| p.iter().copied()).collect()
    }

    fn write_split(data: &[u8], step: usize) -> Vec<u8> {
        let mut out = b"\x1b_G".to_vec();
        let mut pw = PayloadWriter::new(&mut out);
        for part in data.chunks(step.max(1)) {
            pw.write_all(part).unwrap();
        }
        pw.close().unwrap();
        out
    }

    #[test]
    fn test_empty_payload() {
        let out = write_split(&[], 1);
        assert_eq!(out, b"\x1b_Gm=0;\x1b\\");
    }

    #[test]
    fn test_single_chunk() {
        let out = write_split(b"hello", 5);
        assert_eq!(out, b"\x1b_Gm=0;aGVsbG8=\x1b\\");
    }

    #[test]
    fn test_padding_lengths() {
        for n in 1..=7 {
            let data = vec![0xA5u8; n];
            let out = write_split(&data, n);
            let chunks = split_chunks(&out);
            assert_eq!(chunks.len(), 1);
            // "m=0;" + padded base64
            let encoded_len = out.len() - b"\x1b_Gm=0;\x1b\\".len();
            assert_eq!(encoded_len, n.div_ceil(3) * 4);
            assert_eq!(chunks[0].1, data);
        }
    }

    #[test]
    fn test_exactly_one_full_chunk() {
        let data = vec![7u8; CHUNK_RAW_SIZE];
        let chunks = split_chunks(&write_split(&data, 1000));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].0, "m=0");
        assert_eq!(chunks[0].1.len(), CHUNK_RAW_SIZE);
    }

    #[test]
    fn test_chunk_count_and_flags() {
        for n in [
            CHUNK_RAW_SIZE - 1,
            CHUNK_RAW_SIZE + 1,
            2 * CHUNK_RAW_SIZE,
            5 * CHUNK_RAW_SIZE + 17,
        ] {
            let data: Vec<u8> = (0..n).map(|i| (i * 31 % 251) as u8).collect();
            let out = write_split(&data, 1000);
            let chunks = split_chunks(&out);

            let non_final = chunks.iter().filter(|(c, _)| c == "m=1").count();
            assert_eq!(non_final, (n - 1) / CHUNK_RAW_SIZE);
            assert_eq!(chunks.last().unwrap().0, "m=0");
            for (_, p) in &chunks[..chunks.len() - 1] {
                assert_eq!(p.len(), CHUNK_RAW_SIZE);
            }
            assert_eq!(payload(&chunks), data);
        }
    }

    #[test]
    fn test_split_writes_are_transparent() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i ^ (i >> 3)) as u8).collect();
        let reference = write_split(&data, data.len());
        for step in [1, 2, 3, 4, 1023, 3071, 3072, 3073, 8191] {
            assert_eq!(write_split(&data, step), reference, "step {}", step);
        }
        assert_eq!(payload(&split_chunks(&reference)), data);
    }

    #[test]
    fn test_encoded_chunk_length() {
        let data = vec![1u8; CHUNK_RAW_SIZE * 2];
        let out = write_split(&data, 100);
        let text = String::from_utf8(out).unwrap();
        let first = text
            .strip_prefix("\x1b_Gm=1;")
            .and_then(|t| t.split('\x1b').next())
            .unwrap();
        assert_eq!(first.len(), CHUNK_ENC_SIZE);
    }

    #[test]
    fn test_reset_rebinds_sink() {
        let mut pw = PayloadWriter::new(Vec::new());
        pw.write_all(b"abc").unwrap();
        let old = pw.reset(Vec::new());
        assert!(old.is_empty());
        assert_eq!(pw.staged(), 0);

        pw.write_all(b"xyz").unwrap();
        pw.close().unwrap();
        assert_eq!(pw.into_inner(), b"m=0;eHl6\x1b\\");
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_error_propagates() {
        let mut pw = PayloadWriter::new(FailingSink);
        // Fits in the staging buffer: nothing reaches the sink yet
        pw.write_all(&[0u8; CHUNK_RAW_SIZE]).unwrap();

        let err = pw.write_all(&[0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(pw.close().is_err());
    }
}
