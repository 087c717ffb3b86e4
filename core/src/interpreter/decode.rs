use encoding_rs::{Encoding, GBK};

/// How raw output is cut into records before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Splitter {
    /// `\n`, with a trailing `\r` dropped.
    #[default]
    Newline,
    Delimiter(String),
}

impl Splitter {
    pub fn from_option(delimiter: Option<&str>) -> Self {
        match delimiter {
            None | Some("\n") => Splitter::Newline,
            Some(d) => Splitter::Delimiter(d.to_string()),
        }
    }

    fn needle(&self) -> &[u8] {
        match self {
            Splitter::Newline => b"\n",
            Splitter::Delimiter(d) => d.as_bytes(),
        }
    }
}

/// Incremental byte-to-text decoder for one output stream.
///
/// Records are decoded as UTF-8 when valid, otherwise with the configured
/// legacy charset, and lossily as a last resort.
pub struct OutputDecoder {
    splitter: Splitter,
    fallback: &'static Encoding,
    pending: Vec<u8>,
}

impl OutputDecoder {
    pub fn new(splitter: Splitter, fallback_label: &str) -> Self {
        let fallback = Encoding::for_label(fallback_label.as_bytes()).unwrap_or(GBK);
        Self {
            splitter,
            fallback,
            pending: Vec::new(),
        }
    }

    /// Feed a chunk and return every record completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();
        let needle_len = self.splitter.needle().len();
        while let Some(idx) = find(&self.pending, self.splitter.needle()) {
            let mut record: Vec<u8> = self.pending.drain(..idx + needle_len).collect();
            record.truncate(idx);
            out.push(self.decode_record(&record));
        }
        out
    }

    /// Flush a trailing record that was never terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let record = std::mem::take(&mut self.pending);
        Some(self.decode_record(&record))
    }

    fn decode_record(&self, record: &[u8]) -> String {
        let record = match self.splitter {
            Splitter::Newline => record.strip_suffix(b"\r").unwrap_or(record),
            Splitter::Delimiter(_) => record,
        };
        decode_bytes(record, self.fallback)
    }
}

pub fn decode_bytes(bytes: &[u8], fallback: &'static Encoding) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    let (text, had_errors) = fallback.decode_without_bom_handling(bytes);
    if had_errors {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        text.into_owned()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newline_records_span_chunks() {
        let mut d = OutputDecoder::new(Splitter::Newline, "gbk");
        assert!(d.push(b"REA").is_empty());
        assert_eq!(d.push(b"DY\r\nsecond\nthi"), vec!["READY", "second"]);
        assert_eq!(d.finish().as_deref(), Some("thi"));
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn custom_delimiter_keeps_embedded_newlines() {
        let mut d = OutputDecoder::new(Splitter::from_option(Some("\u{1e}")), "gbk");
        let records = d.push("foo\nbar\u{1e}baz\u{1e}".as_bytes());
        assert_eq!(records, vec!["foo\nbar", "baz"]);
    }

    #[test]
    fn gbk_output_is_decoded_with_fallback() {
        let (bytes, _, _) = GBK.encode("进度 50%");
        let mut d = OutputDecoder::new(Splitter::Newline, "gbk");
        let mut chunk = bytes.into_owned();
        chunk.push(b'\n');
        assert_eq!(d.push(&chunk), vec!["进度 50%"]);
    }

    #[test]
    fn empty_lines_are_records() {
        let mut d = OutputDecoder::new(Splitter::Newline, "utf-8");
        assert_eq!(d.push(b"\n\nx\n"), vec!["", "", "x"]);
    }
}
