//! Output sinks
//!
//! The writer needs to know whether it may come back to an earlier offset to
//! patch the bounding box in. A [`Sink`] is a `Write` that answers that
//! question and, when it can, reports positions and seeks back.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Stdout, Write};

/// Byte sink the GPX writer streams into
pub trait Sink: Write {
    /// Whether [`Sink::seek_to`] can move back to an earlier offset
    fn is_back_seekable(&self) -> bool;

    /// Offset the next byte will be written at
    ///
    /// # Errors
    ///
    /// Fails with `ErrorKind::Unsupported` on sinks that are not seekable.
    fn position(&mut self) -> io::Result<u64>;

    /// Move the write position to an absolute offset
    ///
    /// # Errors
    ///
    /// Fails with `ErrorKind::Unsupported` on sinks that are not seekable.
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;
}

fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "sink is not seekable")
}

/// Sink over any seekable writer (files, in-memory cursors)
#[derive(Debug)]
pub struct Seekable<W: Write + Seek>(W);

impl<W: Write + Seek> Seekable<W> {
    /// Wrap a seekable writer
    pub fn new(inner: W) -> Self {
        Self(inner)
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W: Write + Seek> Write for Seekable<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write + Seek> Sink for Seekable<W> {
    fn is_back_seekable(&self) -> bool {
        true
    }

    fn position(&mut self) -> io::Result<u64> {
        self.0.stream_position()
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.0.seek(SeekFrom::Start(offset)).map(|_| ())
    }
}

/// Sink over a forward-only writer (pipes, sockets, stdout)
#[derive(Debug)]
pub struct Streaming<W: Write>(W);

impl<W: Write> Streaming<W> {
    /// Wrap a forward-only writer
    pub fn new(inner: W) -> Self {
        Self(inner)
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W: Write> Write for Streaming<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> Sink for Streaming<W> {
    fn is_back_seekable(&self) -> bool {
        false
    }

    fn position(&mut self) -> io::Result<u64> {
        Err(unsupported())
    }

    fn seek_to(&mut self, _offset: u64) -> io::Result<()> {
        Err(unsupported())
    }
}

/// Sink opened by [`GpxWriter::create`](crate::GpxWriter::create)
#[derive(Debug)]
pub enum FileSink {
    /// Regular file, buffered
    File(BufWriter<File>),
    /// Standard output; never seekable
    Stdout(Stdout),
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(file) => file.write(buf),
            Self::Stdout(out) => out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(file) => file.flush(),
            Self::Stdout(out) => out.flush(),
        }
    }
}

impl Sink for FileSink {
    fn is_back_seekable(&self) -> bool {
        matches!(self, Self::File(_))
    }

    fn position(&mut self) -> io::Result<u64> {
        match self {
            Self::File(file) => file.stream_position(),
            Self::Stdout(_) => Err(unsupported()),
        }
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        match self {
            // BufWriter flushes pending bytes before seeking.
            Self::File(file) => file.seek(SeekFrom::Start(offset)).map(|_| ()),
            Self::Stdout(_) => Err(unsupported()),
        }
    }
}
