use defmt_or_log::warn;

/// Longest line kept while waiting for its `\n`, replies are a few dozen bytes.
pub const MAX_LINE_LEN: usize = 1024;

/// Reassembles lines out of arbitrarily chunked bytes.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// the current line overflowed, skip until its end
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, without the trailing `\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &b in chunk {
            if b == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else {
                    lines.push(core::mem::take(&mut self.buf));
                }
                continue;
            }
            if self.discarding {
                continue;
            }
            if self.buf.len() == MAX_LINE_LEN {
                warn!("LineBuffer: no line terminator in {} bytes, discarding line", MAX_LINE_LEN);
                self.buf.clear();
                self.discarding = true;
                continue;
            }
            self.buf.push(b);
        }
        lines
    }

    /// bytes of the line still waiting for its end
    pub fn partial(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_reply() {
        let mut lines = LineBuffer::new();
        assert!(lines.push(b"R13 A10 L5").is_empty());
        assert_eq!(lines.partial(), b"R13 A10 L5");
        assert_eq!(lines.push(b"12 OK\r\n"), vec![b"R13 A10 L512 OK\r".to_vec()]);
        assert!(lines.partial().is_empty());
    }

    #[test]
    fn many_replies_in_one_chunk() {
        let mut lines = LineBuffer::new();
        let out = lines.push(b"\r\nR12 D1 L1 OK\r\nM56 OK\r\nR13");
        assert_eq!(
            out,
            vec![b"\r".to_vec(), b"R12 D1 L1 OK\r".to_vec(), b"M56 OK\r".to_vec()]
        );
        assert_eq!(lines.partial(), b"R13");
    }

    #[test]
    fn overlong_line_is_dropped() {
        let mut lines = LineBuffer::new();
        let junk = vec![b'x'; MAX_LINE_LEN + 10];
        assert!(lines.push(&junk).is_empty());
        assert!(lines.push(b"still junk").is_empty());
        assert_eq!(lines.push(b"\nM57 OK\n"), vec![b"M57 OK".to_vec()]);
    }
}
