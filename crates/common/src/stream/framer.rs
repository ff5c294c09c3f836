//! Buffered record framer for chunked text transports
//!
//! A transport read rarely lines up with record boundaries: one read may
//! carry half a record, or several records plus a fragment. The framer
//! accumulates bytes, splits on the blank-line delimiter, and holds the
//! trailing partial record until the next read completes it.

/// Accumulates transport bytes and yields complete blank-line-delimited
/// records.
#[derive(Debug, Default)]
pub struct RecordFramer {
    buf: Vec<u8>,
}

impl RecordFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport read; returns every record completed by it.
    ///
    /// Records are separated by a blank line (`\n\n`, CR tolerated). The
    /// trailing partial record stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut records = Vec::new();
        loop {
            let Some((pos, len)) = find_delimiter(&self.buf) else {
                break;
            };
            let record: Vec<u8> = self.buf.drain(..pos + len).collect();
            let record = String::from_utf8_lossy(&record[..pos]).into_owned();
            if !record.trim().is_empty() {
                records.push(record);
            }
        }
        records
    }

    /// Drain whatever partial record remains after the transport closes.
    pub fn finish(mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let record = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        let record = record.trim().to_string();
        if record.is_empty() {
            None
        } else {
            Some(record)
        }
    }
}

/// Locate the earliest blank-line delimiter, returning its offset and
/// byte length. Accepts LF and CRLF line endings.
fn find_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            match buf.get(i + 1) {
                Some(b'\n') => return Some((i, 2)),
                Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some((i, 3)),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Extract the joined `data:` payload from one SSE record.
///
/// Comment lines and unknown fields are ignored; multiple data lines are
/// joined with newlines following SSE semantics. Returns None for records with no
/// data field (e.g. heartbeats).
pub fn sse_data(record: &str) -> Option<String> {
    let mut payload: Option<String> = None;
    for line in record.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            match payload {
                Some(ref mut p) => {
                    p.push('\n');
                    p.push_str(rest);
                }
                None => payload = Some(rest.to_string()),
            }
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_read_single_record() {
        let mut framer = RecordFramer::new();
        let records = framer.push(b"data: {\"type\":\"token\",\"data\":\"X\"}\n\n");
        assert_eq!(records.len(), 1);
        assert_eq!(sse_data(&records[0]).unwrap(), r#"{"type":"token","data":"X"}"#);
    }

    #[test]
    fn test_record_split_across_reads() {
        let mut framer = RecordFramer::new();
        assert!(framer.push(b"data: {\"type\":\"tok").is_empty());
        let records = framer.push(b"en\",\"data\":\"Y\"}\n\ndata: partial");
        assert_eq!(records.len(), 1);
        assert_eq!(
            sse_data(&records[0]).unwrap(),
            r#"{"type":"token","data":"Y"}"#
        );
        assert_eq!(framer.finish().unwrap(), "data: partial");
    }

    #[test]
    fn test_multiple_records_in_one_read() {
        let mut framer = RecordFramer::new();
        let records = framer.push(b"data: a\n\ndata: b\n\ndata: c\n\n");
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_utf8_boundary_held_in_buffer() {
        // "高" is three bytes; split it across two reads
        let bytes = "data: 高\n\n".as_bytes();
        let mut framer = RecordFramer::new();
        assert!(framer.push(&bytes[..7]).is_empty());
        let records = framer.push(&bytes[7..]);
        assert_eq!(sse_data(&records[0]).unwrap(), "高");
    }

    #[test]
    fn test_crlf_records() {
        let mut framer = RecordFramer::new();
        let records = framer.push(b"data: x\r\n\r\ndata: y\r\n\r\n");
        assert_eq!(records.len(), 2);
        assert_eq!(sse_data(&records[0]).unwrap(), "x");
        assert_eq!(sse_data(&records[1]).unwrap(), "y");
    }

    #[test]
    fn test_comment_only_record_has_no_data() {
        assert_eq!(sse_data(": keep-alive"), None);
    }

    #[test]
    fn test_multi_data_lines_joined() {
        assert_eq!(sse_data("data: line1\ndata: line2").unwrap(), "line1\nline2");
    }
}
