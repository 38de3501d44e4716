//! Lazy response bodies.

use crate::request::ByteRange;
use flate2::read::GzEncoder;
use flate2::Compression;
use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom, Write};

enum Segment {
    /// Bytes generated by the responder (multipart headers and boundaries).
    Literal { bytes: Vec<u8>, pos: usize },
    /// A span of the source, seeked to on first read.
    Span {
        start: u64,
        remaining: u64,
        positioned: bool,
    },
}

/// Plays a sequence of literal and source-backed segments as one stream.
pub(crate) struct Segments<R> {
    source: R,
    queue: VecDeque<Segment>,
}

impl<R: Read + Seek> Segments<R> {
    pub(crate) fn new(source: R) -> Self {
        Self {
            source,
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn literal(&mut self, bytes: impl Into<Vec<u8>>) {
        self.queue.push_back(Segment::Literal {
            bytes: bytes.into(),
            pos: 0,
        });
    }

    pub(crate) fn span(&mut self, range: ByteRange) {
        self.queue.push_back(Segment::Span {
            start: range.start,
            remaining: range.len(),
            positioned: false,
        });
    }
}

impl<R: Read + Seek> Read for Segments<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while let Some(segment) = self.queue.front_mut() {
            let read = match segment {
                Segment::Literal { bytes, pos } => {
                    let n = (bytes.len() - *pos).min(buf.len());
                    buf[..n].copy_from_slice(&bytes[*pos..*pos + n]);
                    *pos += n;
                    n
                }
                Segment::Span {
                    start,
                    remaining,
                    positioned,
                } => {
                    if *remaining == 0 {
                        0
                    } else {
                        if !*positioned {
                            self.source.seek(SeekFrom::Start(*start))?;
                            *positioned = true;
                        }
                        let want = usize::try_from(*remaining)
                            .unwrap_or(usize::MAX)
                            .min(buf.len());
                        let n = self.source.read(&mut buf[..want])?;
                        if n == 0 {
                            return Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "source ended before the advertised length",
                            ));
                        }
                        *remaining -= n as u64;
                        n
                    }
                }
            };

            if read > 0 {
                return Ok(read);
            }
            self.queue.pop_front();
        }

        Ok(0)
    }
}

enum Inner<R> {
    Empty,
    Plain(Segments<R>),
    Gzip(GzEncoder<Segments<R>>),
}

/// A response body that reads from its source only on demand.
///
/// Dropping the body drops (and so closes) the source.
pub struct RangeBody<R> {
    inner: Inner<R>,
    buffer_size: usize,
}

impl<R: Read + Seek> RangeBody<R> {
    pub(crate) fn empty(buffer_size: usize) -> Self {
        Self {
            inner: Inner::Empty,
            buffer_size,
        }
    }

    pub(crate) fn plain(segments: Segments<R>, buffer_size: usize) -> Self {
        Self {
            inner: Inner::Plain(segments),
            buffer_size,
        }
    }

    pub(crate) fn gzip(segments: Segments<R>, buffer_size: usize) -> Self {
        Self {
            inner: Inner::Gzip(GzEncoder::new(segments, Compression::default())),
            buffer_size,
        }
    }

    /// True when the body produces no bytes at all (304, 412, 416 and `HEAD` responses).
    pub fn is_empty(&self) -> bool {
        matches!(self.inner, Inner::Empty)
    }

    /// Chunk size consumers should read with.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Copies the whole body into `out` in `buffer_size` chunks.
    pub fn copy_to<W: Write>(mut self, out: &mut W) -> io::Result<u64> {
        let mut buf = vec![0u8; self.buffer_size.max(1)];
        let mut total = 0u64;
        loop {
            let n = match self.read(&mut buf) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            out.write_all(&buf[..n])?;
            total += n as u64;
        }
    }
}

impl<R: Read + Seek> Read for RangeBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Empty => Ok(0),
            Inner::Plain(segments) => segments.read(buf),
            Inner::Gzip(encoder) => encoder.read(buf),
        }
    }
}

impl<R> std::fmt::Debug for RangeBody<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner {
            Inner::Empty => "empty",
            Inner::Plain(_) => "plain",
            Inner::Gzip(_) => "gzip",
        };
        f.debug_struct("RangeBody")
            .field("kind", &kind)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}
