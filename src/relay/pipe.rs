//! Bounded in-memory pipes with half-close semantics

use tokio::io::{ReadHalf, SimplexStream, WriteHalf};

/// Read end of a unidirectional pipe
pub type PipeReader = ReadHalf<SimplexStream>;

/// Write end of a unidirectional pipe
pub type PipeWriter = WriteHalf<SimplexStream>;

/// Default in-flight buffer per pipe leg
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// Open a fresh unidirectional pipe with the given buffer capacity.
///
/// The writer blocks once `capacity` unread bytes are in flight; dropping
/// the writer delivers EOF to the reader after the buffered bytes drain.
pub fn pipe(capacity: usize) -> (PipeReader, PipeWriter) {
    tokio::io::simplex(capacity)
}

/// One producer slot's pipe, with idempotent close bookkeeping
///
/// The orchestrator opens one pair per leg (producer→pump, pump→transport)
/// and hands ends to their consumers with [`detach_reader`]/[`detach_writer`];
/// whatever is still held when the slot finishes is released by [`close`].
/// Each half is dropped exactly once no matter which path the slot exits
/// through: detached halves die with their new owner, retained halves die
/// here.
///
/// [`detach_reader`]: PipePair::detach_reader
/// [`detach_writer`]: PipePair::detach_writer
/// [`close`]: PipePair::close
#[derive(Debug)]
pub struct PipePair {
    reader: Option<PipeReader>,
    writer: Option<PipeWriter>,
}

impl PipePair {
    pub fn open(capacity: usize) -> Self {
        let (reader, writer) = pipe(capacity);
        Self {
            reader: Some(reader),
            writer: Some(writer),
        }
    }

    /// Open a pair with the read end handed straight to its consumer.
    ///
    /// The pair keeps close bookkeeping for the retained write end only;
    /// the detached reader dies with its new owner.
    pub fn open_with_reader(capacity: usize) -> (PipeReader, Self) {
        let (reader, writer) = pipe(capacity);
        (
            reader,
            Self {
                reader: None,
                writer: Some(writer),
            },
        )
    }

    /// Open a pair with the write end handed straight to its consumer.
    pub fn open_with_writer(capacity: usize) -> (PipeWriter, Self) {
        let (reader, writer) = pipe(capacity);
        (
            writer,
            Self {
                reader: Some(reader),
                writer: None,
            },
        )
    }

    /// Hand the read end to its consumer. `None` if already detached/closed.
    pub fn detach_reader(&mut self) -> Option<PipeReader> {
        self.reader.take()
    }

    /// Hand the write end to its consumer. `None` if already detached/closed.
    pub fn detach_writer(&mut self) -> Option<PipeWriter> {
        self.writer.take()
    }

    /// Borrow the read end in place (for the pump).
    pub fn reader_mut(&mut self) -> Option<&mut PipeReader> {
        self.reader.as_mut()
    }

    /// Borrow the write end in place (for the pump).
    pub fn writer_mut(&mut self) -> Option<&mut PipeWriter> {
        self.writer.as_mut()
    }

    /// Release any ends still held. Idempotent.
    pub fn close(&mut self) {
        self.reader = None;
        self.writer = None;
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }
}
