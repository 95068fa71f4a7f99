//! Control-header framing.
//!
//! A mirror stream opens with a short text header terminated by CRLF CRLF,
//! then carries raw media bytes until the connection closes. The header
//! can arrive split across any number of reads, including mid-terminator,
//! so the splitter accumulates bytes until it has seen the terminator once
//! and then gets out of the way.

use thiserror::Error;

use crate::protocol::HEADER_TERMINATOR;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("control header exceeded {limit} bytes without a terminator")]
    TooLong { limit: usize },
}

/// Result of feeding one chunk through the splitter.
#[derive(Debug, PartialEq)]
pub enum Split<'a> {
    /// Still inside the control header; nothing to forward.
    Buffering,
    /// This chunk completed the header. `header` holds the full control
    /// header (terminator included); `payload` is the remainder of the
    /// same chunk, possibly empty.
    HeaderComplete { header: Vec<u8>, payload: &'a [u8] },
    /// Header already consumed; the whole chunk is payload.
    Payload(&'a [u8]),
}

/// Per-connection framing state. Once the terminator has been located the
/// splitter never scans again; every later chunk passes through whole.
pub struct HeaderSplitter {
    pending: Vec<u8>,
    header_done: bool,
    max_header_len: usize,
}

impl HeaderSplitter {
    pub fn new(max_header_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            header_done: false,
            max_header_len,
        }
    }

    pub fn feed<'a>(&mut self, chunk: &'a [u8]) -> Result<Split<'a>, HeaderError> {
        if self.header_done {
            return Ok(Split::Payload(chunk));
        }

        let scanned = self.pending.len();
        self.pending.extend_from_slice(chunk);

        match terminator_end(&self.pending) {
            Some(end) => {
                self.header_done = true;
                let mut header = std::mem::take(&mut self.pending);
                header.truncate(end);
                // The previously scanned bytes held no terminator, so it
                // ends inside this chunk: end > scanned always holds.
                Ok(Split::HeaderComplete {
                    header,
                    payload: &chunk[end - scanned..],
                })
            }
            None if self.pending.len() > self.max_header_len => Err(HeaderError::TooLong {
                limit: self.max_header_len,
            }),
            None => Ok(Split::Buffering),
        }
    }

    /// True once the control header has been consumed.
    pub fn header_done(&self) -> bool {
        self.header_done
    }
}

/// Index one past the first CRLF CRLF, if present.
fn terminator_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|p| p + HEADER_TERMINATOR.len())
}
