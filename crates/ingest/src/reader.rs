use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

// Single structured envelopes routinely exceed a megabyte; size the buffer
// so they stream without re-fills.
const BUFFER_CAPACITY: usize = 4 << 20;

/// One complete line handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Zero-based line number within the file.
    pub line_no: u64,
    /// Byte offset of the first byte of this line.
    pub offset: u64,
    /// Exact byte count consumed, including the line terminator.
    pub len: u64,
    /// Line content with the terminator (and any trailing CR) removed.
    pub text: String,
}

impl LogLine {
    /// Offset of the first byte past this line: the resume boundary after
    /// the line is committed.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.len
    }
}

/// Streams newline-terminated lines from a byte offset onward.
///
/// An unterminated final line is withheld entirely: its bytes stay unread so
/// a later invocation observes them together with whatever the client
/// appends next.
pub struct LogReader {
    reader: BufReader<File>,
    next_offset: u64,
    next_line_no: u64,
    done: bool,
    buf: Vec<u8>,
}

impl LogReader {
    pub fn open(path: &Path, offset: u64, line_no: u64) -> std::io::Result<LogReader> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        reader.seek(SeekFrom::Start(offset))?;
        Ok(LogReader {
            reader,
            next_offset: offset,
            next_line_no: line_no,
            done: false,
            buf: Vec::new(),
        })
    }

    /// The next complete line, or None at (possibly ragged) end of file.
    pub fn next_line(&mut self) -> std::io::Result<Option<LogLine>> {
        if self.done {
            return Ok(None);
        }
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 || self.buf.last() != Some(&b'\n') {
            // EOF, or a line still being written. Either way this reader is
            // exhausted; the withheld bytes are re-read next invocation.
            self.done = true;
            return Ok(None);
        }

        let mut end = self.buf.len() - 1;
        if end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }
        let line = LogLine {
            line_no: self.next_line_no,
            offset: self.next_offset,
            len: n as u64,
            text: String::from_utf8_lossy(&self.buf[..end]).into_owned(),
        };
        self.next_line_no += 1;
        self.next_offset += n as u64;
        Ok(Some(line))
    }
}
