//! Line-oriented log filtering: regex match, then tail or head.

use regex::Regex;

use crate::error::{ClientError, Result};

/// Filters applied to a log stream before returning it to the caller.
///
/// Pattern matching runs first; `tail` takes precedence over `head`.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Keep only the first N lines.
    pub head: Option<usize>,
    /// Keep only the last N lines (wins over `head`).
    pub tail: Option<usize>,
    /// Keep only lines matching this regex.
    pub pattern: Option<String>,
}

impl LogFilter {
    pub fn is_noop(&self) -> bool {
        self.head.is_none() && self.tail.is_none() && self.pattern.is_none()
    }

    /// Apply the filter to a log text, preserving line endings.
    pub fn apply(&self, text: &str) -> Result<String> {
        if text.is_empty() || self.is_noop() {
            return Ok(text.to_string());
        }

        let mut lines: Vec<&str> = text.split_inclusive('\n').collect();

        if let Some(pattern) = &self.pattern {
            let re = Regex::new(pattern).map_err(|e| {
                ClientError::InvalidArgument(format!("bad log pattern '{pattern}': {e}"))
            })?;
            lines.retain(|line| re.is_match(line));
        }

        if let Some(tail) = self.tail {
            let start = lines.len().saturating_sub(tail);
            lines.drain(..start);
        } else if let Some(head) = self.head {
            lines.truncate(head);
        }

        Ok(lines.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "step start\nloading data\nERROR: bad row\ndone\n";

    #[test]
    fn test_noop_returns_input() {
        let filtered = LogFilter::default().apply(LOG).unwrap();
        assert_eq!(filtered, LOG);
    }

    #[test]
    fn test_head() {
        let filter = LogFilter {
            head: Some(2),
            ..Default::default()
        };
        assert_eq!(filter.apply(LOG).unwrap(), "step start\nloading data\n");
    }

    #[test]
    fn test_tail() {
        let filter = LogFilter {
            tail: Some(1),
            ..Default::default()
        };
        assert_eq!(filter.apply(LOG).unwrap(), "done\n");
    }

    #[test]
    fn test_tail_wins_over_head() {
        let filter = LogFilter {
            head: Some(1),
            tail: Some(1),
            ..Default::default()
        };
        assert_eq!(filter.apply(LOG).unwrap(), "done\n");
    }

    #[test]
    fn test_pattern_then_tail() {
        let filter = LogFilter {
            tail: Some(1),
            pattern: Some(r"^(ERROR|step)".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(LOG).unwrap(), "ERROR: bad row\n");
    }

    #[test]
    fn test_bad_pattern_is_invalid_argument() {
        let filter = LogFilter {
            pattern: Some("(".into()),
            ..Default::default()
        };
        let err = filter.apply(LOG).unwrap_err();
        assert_eq!(err.kind_name(), "InvalidArgumentError");
    }

    #[test]
    fn test_empty_input() {
        let filter = LogFilter {
            tail: Some(3),
            ..Default::default()
        };
        assert_eq!(filter.apply("").unwrap(), "");
    }
}
