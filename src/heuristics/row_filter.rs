use super::{FilterRules, FilteredLines};
use regex::Regex;
use std::sync::LazyLock;

/// A row number at the start of the line: digits then whitespace.
static LEADING_ROW_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s").expect("static regex"));

/// What the filter does with a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    /// Trailer section reached; nothing from here on is kept.
    Stop,
    Header,
    Data,
    Drop,
}

impl FilterRules {
    /// Classify one line. Pure: depends only on the line's content.
    pub fn classify(&self, line: &str) -> LineVerdict {
        let upper = line.to_uppercase();

        if self.stop_markers.iter().any(|m| upper.contains(m.as_str())) {
            return LineVerdict::Stop;
        }

        if self.is_header(&upper) {
            return LineVerdict::Header;
        }

        if LEADING_ROW_NUMBER.is_match(line) {
            return LineVerdict::Data;
        }

        let narrative =
            !self.non_table_prefix.is_empty() && upper.starts_with(self.non_table_prefix.as_str());
        if line.contains(',') && !narrative {
            return LineVerdict::Data;
        }

        LineVerdict::Drop
    }

    fn is_header(&self, upper: &str) -> bool {
        !self.header_keyword.is_empty()
            && upper.contains(self.header_keyword.as_str())
            && self
                .member_id_keywords
                .iter()
                .any(|k| upper.contains(k.as_str()))
    }
}

/// Keep the lines that look like rows of the billing table.
///
/// Scanning stops at the first trailer line. If nothing survives, every
/// input line is handed on instead so the table never disappears.
pub fn filter_rows(lines: &[String], rules: &FilterRules) -> FilteredLines {
    let mut kept = Vec::new();
    let mut halted_at = None;

    for (idx, line) in lines.iter().enumerate() {
        match rules.classify(line) {
            LineVerdict::Stop => {
                halted_at = Some(idx);
                break;
            }
            LineVerdict::Header | LineVerdict::Data => kept.push(line.clone()),
            LineVerdict::Drop => {}
        }
    }

    if kept.is_empty() {
        return FilteredLines {
            lines: lines.to_vec(),
            halted_at,
            fallback: true,
        };
    }

    FilteredLines {
        lines: kept,
        halted_at,
        fallback: false,
    }
}
