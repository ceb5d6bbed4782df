//! Line-oriented reader over a streamed log body.

use futures::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use std::io;
use std::pin::Pin;

/// Longest line accepted, terminator excluded
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Byte stream of a pod's log output, released when dropped
pub type LogStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// Reads a [`LogStream`] one line at a time.
///
/// Bytes are only pulled from the underlying stream as lines are requested,
/// so a caller can stop early without draining a long-lived source. A
/// scanner wraps exactly one stream and cannot be restarted; the stream is
/// released once, either by [`LineScanner::close`] or when the scanner is
/// dropped on any other exit path.
pub struct LineScanner {
    stream: LogStream,
    buf: Vec<u8>,
    lines_read: usize,
}

impl LineScanner {
    pub fn new(stream: LogStream) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            lines_read: 0,
        }
    }

    /// Next line without its terminator, or `None` at end of stream.
    ///
    /// Invalid UTF-8 is replaced rather than treated as a read error. A line
    /// longer than [`MAX_LINE_BYTES`] is an `InvalidData` error; at most
    /// that many bytes (plus a terminator) are buffered.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let limit = (MAX_LINE_BYTES + 2) as u64;
        let n = (&mut self.stream)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        if self.buf.len() > MAX_LINE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("log line exceeds {MAX_LINE_BYTES} bytes"),
            ));
        }

        self.lines_read += 1;
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Number of lines handed out so far
    #[must_use]
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Release the underlying stream
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use futures::stream::{self, StreamExt, TryStreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn scanner(text: &str) -> LineScanner {
        LineScanner::new(Box::pin(Cursor::new(text.as_bytes().to_vec())))
    }

    #[tokio::test]
    async fn test_reads_lines_in_order() {
        let mut s = scanner("one\ntwo\r\nthree");

        assert_eq!(s.next_line().await.unwrap().as_deref(), Some("one"));
        assert_eq!(s.next_line().await.unwrap().as_deref(), Some("two"));
        assert_eq!(s.next_line().await.unwrap().as_deref(), Some("three"));
        assert_eq!(s.next_line().await.unwrap(), None);
        assert_eq!(s.lines_read(), 3);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut s = scanner("");
        assert_eq!(s.next_line().await.unwrap(), None);
        assert_eq!(s.lines_read(), 0);
    }

    #[tokio::test]
    async fn test_blank_lines_are_lines() {
        let mut s = scanner("\n\nx\n");
        assert_eq!(s.next_line().await.unwrap().as_deref(), Some(""));
        assert_eq!(s.next_line().await.unwrap().as_deref(), Some(""));
        assert_eq!(s.next_line().await.unwrap().as_deref(), Some("x"));
        assert_eq!(s.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let bytes = vec![b'o', b'k', 0xff, b'\n'];
        let mut s = LineScanner::new(Box::pin(Cursor::new(bytes)));
        assert_eq!(s.next_line().await.unwrap().as_deref(), Some("ok\u{fffd}"));
    }

    #[tokio::test]
    async fn test_pulls_chunks_lazily() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let chunks = vec!["first\n", "second\n", "third\n"];
        let reader = stream::iter(chunks)
            .map(move |chunk| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, io::Error>(chunk.as_bytes().to_vec())
            })
            .into_async_read();

        let mut s = LineScanner::new(Box::pin(reader));
        assert_eq!(s.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
        s.close();
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let line = "a".repeat(MAX_LINE_BYTES);
        let mut s = scanner(&format!("{line}\r\nnext\n"));
        assert_eq!(s.next_line().await.unwrap().map(|l| l.len()), Some(MAX_LINE_BYTES));
        assert_eq!(s.next_line().await.unwrap().as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_overlong_line_is_an_error() {
        let line = "a".repeat(MAX_LINE_BYTES + 1);
        let mut s = scanner(&format!("{line}\nnext\n"));
        let err = s.next_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(s.lines_read(), 0);
    }

    #[tokio::test]
    async fn test_unterminated_overlong_line_stops_buffering() {
        let mut s = scanner(&"a".repeat(4 * MAX_LINE_BYTES));
        let err = s.next_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(s.buf.len() <= MAX_LINE_BYTES + 2);
    }

    #[tokio::test]
    async fn test_read_error_surfaces() {
        let reader = stream::iter(vec![
            Ok(b"fine\n".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ])
        .into_async_read();

        let mut s = LineScanner::new(Box::pin(reader));
        assert_eq!(s.next_line().await.unwrap().as_deref(), Some("fine"));
        let err = s.next_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
