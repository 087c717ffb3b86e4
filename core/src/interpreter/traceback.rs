const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonTraceback {
    /// Final `ExceptionType: message` line.
    pub exception: String,
    /// Whole block, header and exception line included.
    pub traceback: String,
}

/// Picks Python tracebacks out of a stderr line stream.
///
/// Capture starts at the traceback header and ends at the first line that
/// is not indented, which is the exception line.
#[derive(Debug, Default)]
pub struct TracebackCollector {
    lines: Vec<String>,
    active: bool,
}

impl TracebackCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, line: &str) -> Option<PythonTraceback> {
        if line.trim_end() == TRACEBACK_HEADER {
            self.active = true;
            self.lines.clear();
            self.lines.push(line.to_string());
            return None;
        }
        if !self.active {
            return None;
        }
        self.lines.push(line.to_string());
        let indented = line.starts_with(char::is_whitespace);
        if line.trim().is_empty() || indented {
            return None;
        }
        self.active = false;
        Some(PythonTraceback {
            exception: line.trim().to_string(),
            traceback: std::mem::take(&mut self.lines).join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_block_until_exception_line() {
        let mut c = TracebackCollector::new();
        let input = [
            "warming up",
            "Traceback (most recent call last):",
            "  File \"main.py\", line 3, in <module>",
            "    run()",
            "ValueError: bad input",
        ];
        let mut found = None;
        for line in input {
            if let Some(tb) = c.observe(line) {
                found = Some(tb);
            }
        }
        let tb = found.unwrap();
        assert_eq!(tb.exception, "ValueError: bad input");
        assert!(tb.traceback.starts_with("Traceback (most recent call last):"));
        assert!(tb.traceback.contains("    run()"));
        assert!(!tb.traceback.contains("warming up"));
    }

    #[test]
    fn plain_stderr_is_ignored() {
        let mut c = TracebackCollector::new();
        assert_eq!(c.observe("DeprecationWarning: something"), None);
        assert_eq!(c.observe("ValueError: not inside a traceback"), None);
    }
}
