use std::collections::VecDeque;

/// Longest unterminated line kept before the rest of it is discarded.
pub const MAX_LINE_BYTES: usize = 4096;

/// Splits a raw byte stream into text lines.
///
/// Lines end at `\n`; a trailing `\r` is stripped and invalid UTF-8 is
/// replaced rather than rejected. A line longer than the limit is dropped in
/// full, up to and including its terminator.
#[derive(Debug)]
pub struct LineAssembler {
    buf: Vec<u8>,
    ready: VecDeque<String>,
    max_line: usize,
    discarding: bool,
    overflows: u64,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl LineAssembler {
    pub fn new(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            ready: VecDeque::new(),
            max_line: max_line.max(1),
            discarding: false,
            overflows: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else {
                    self.finish_line();
                }
                continue;
            }
            if self.discarding {
                continue;
            }
            if self.buf.len() == self.max_line {
                self.buf.clear();
                self.discarding = true;
                self.overflows += 1;
                tracing::debug!(limit = self.max_line, "discarding overlong line");
                continue;
            }
            self.buf.push(b);
        }
    }

    fn finish_line(&mut self) {
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        self.ready.push_back(line);
    }

    pub fn pop_line(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Bytes held for the current unterminated line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Overlong lines dropped so far.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.ready.clear();
        self.discarding = false;
    }
}
