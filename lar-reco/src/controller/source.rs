//! Event input streams.

use crate::core::Event;
use crate::errors::EventSourceError;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A stream of events in input order.
pub trait EventSource: Send {
    /// Reads and decodes the next event. `Ok(None)` means the input is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or decoded.
    fn next_event(&mut self) -> Result<Option<Event>, EventSourceError>;

    /// Advances past the next event without decoding it. Returns false if the
    /// input is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read.
    fn skip_event(&mut self) -> Result<bool, EventSourceError>;
}

/// An in-memory source, mostly for tests and benchmarks.
#[derive(Debug, Clone, Default)]
pub struct VecEventSource {
    events: VecDeque<Event>,
    decoded: Vec<u64>,
}

impl VecEventSource {
    /// Creates a source over the given events.
    #[must_use]
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: events.into(),
            decoded: Vec::new(),
        }
    }

    /// Numbers of the events handed out by [`EventSource::next_event`].
    #[must_use]
    pub fn decoded(&self) -> &[u64] {
        &self.decoded
    }

    /// Number of events not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl EventSource for VecEventSource {
    fn next_event(&mut self) -> Result<Option<Event>, EventSourceError> {
        let event = self.events.pop_front();
        if let Some(event) = &event {
            self.decoded.push(event.number);
        }
        Ok(event)
    }

    fn skip_event(&mut self) -> Result<bool, EventSourceError> {
        Ok(self.events.pop_front().is_some())
    }
}

/// Reads one JSON-encoded [`Event`] per line. Blank lines are ignored.
#[derive(Debug)]
pub struct JsonLinesEventSource<R> {
    reader: R,
    path: PathBuf,
    line: usize,
    buffer: Vec<u8>,
}

impl JsonLinesEventSource<BufReader<File>> {
    /// Opens an event file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventSourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| EventSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file), path))
    }
}

impl<R: BufRead + Send> JsonLinesEventSource<R> {
    /// Wraps an already open reader; `path` is only used in error messages.
    pub fn from_reader(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            line: 0,
            buffer: Vec::new(),
        }
    }

    /// Reads the next non-blank line into the buffer. Returns false at end
    /// of input.
    fn read_record(&mut self) -> Result<bool, EventSourceError> {
        loop {
            self.buffer.clear();
            // Raw bytes: a record that is not UTF-8 is malformed, not unreadable.
            let read = self
                .reader
                .read_until(b'\n', &mut self.buffer)
                .map_err(|source| EventSourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            if read == 0 {
                return Ok(false);
            }
            self.line += 1;
            if !self.buffer.iter().all(u8::is_ascii_whitespace) {
                return Ok(true);
            }
        }
    }
}

impl<R: BufRead + Send> EventSource for JsonLinesEventSource<R> {
    fn next_event(&mut self) -> Result<Option<Event>, EventSourceError> {
        if !self.read_record()? {
            return Ok(None);
        }
        let record = std::str::from_utf8(&self.buffer).map_err(|e| EventSourceError::Malformed {
            line: self.line,
            reason: e.to_string(),
        })?;
        serde_json::from_str(record.trim())
            .map(Some)
            .map_err(|e| EventSourceError::Malformed {
                line: self.line,
                reason: e.to_string(),
            })
    }

    fn skip_event(&mut self) -> Result<bool, EventSourceError> {
        self.read_record()
    }
}
