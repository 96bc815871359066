//! Replayable reader for format sniffing
//!
//! Decoders want `BufRead + Seek`, but the input may be a pipe. [`Rewind`]
//! records everything pulled from the inner reader so that any recorded
//! position can be sought back to, and [`Rewind::replay`] hands out the
//! whole stream from byte 0 without recording further.

use std::io::{self, BufRead, Chain, Cursor, Read, Seek, SeekFrom};

const FILL_SIZE: usize = 8 * 1024;

pub struct Rewind<R> {
    inner: R,
    recorded: Vec<u8>,
    pos: u64,
    block: Box<[u8; FILL_SIZE]>,
}

impl<R: Read> Rewind<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            recorded: Vec::new(),
            pos: 0,
            block: Box::new([0; FILL_SIZE]),
        }
    }

    /// Bytes pulled from the inner reader so far
    pub fn recorded(&self) -> usize {
        self.recorded.len()
    }

    /// Pull the next block from the inner reader. Returns 0 at end of input.
    fn pull(&mut self) -> io::Result<usize> {
        let n = loop {
            match self.inner.read(&mut self.block[..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                res => break res?,
            }
        };
        self.recorded.extend_from_slice(&self.block[..n]);
        Ok(n)
    }

    /// The full stream from byte 0: recorded prefix, then the rest of the
    /// inner reader.
    pub fn replay(self) -> Chain<Cursor<Vec<u8>>, R> {
        Cursor::new(self.recorded).chain(self.inner)
    }
}

impl<R: Read> Read for Rewind<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for Rewind<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.pos >= self.recorded.len() as u64 {
            if self.pull()? == 0 {
                return Ok(&[]);
            }
        }
        Ok(&self.recorded[self.pos as usize..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos += amt as u64;
    }
}

impl<R: Read> Seek for Rewind<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
            SeekFrom::End(d) => {
                while self.pull()? > 0 {}
                (self.recorded.len() as u64).checked_add_signed(d)
            }
        };
        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
