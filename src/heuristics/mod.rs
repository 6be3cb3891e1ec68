// src/heuristics/mod.rs

mod lines;
mod row_filter;

pub use lines::normalize_pages;
pub use row_filter::{LineVerdict, filter_rows};

/// Section headers that follow the billing table on the observed reports.
const STOP_MARKERS: [&str; 7] = [
    "AP'S OVERDUE",
    "AP'S DUE",
    "OVERDUE AP",
    "DUE CM",
    "SEPTEMBER",
    "ALL INTAKE",
    "NEEDS H0044",
];

/// Lexical signals used to pick table rows out of extracted text.
///
/// All phrases are held upper-cased; lines are upper-cased before matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRules {
    /// A line containing any of these ends the scan.
    pub stop_markers: Vec<String>,
    /// Header rows contain this word ...
    pub header_keyword: String,
    /// ... together with one of these member-id column spellings.
    pub member_id_keywords: Vec<String>,
    /// Comma lines starting with this belong to a narrative block, not the table.
    pub non_table_prefix: String,
}

impl FilterRules {
    pub fn new<'a>(
        stop_markers: impl IntoIterator<Item = &'a str>,
        header_keyword: &str,
        member_id_keywords: impl IntoIterator<Item = &'a str>,
        non_table_prefix: &str,
    ) -> Self {
        Self {
            stop_markers: upper_all(stop_markers),
            header_keyword: header_keyword.trim().to_uppercase(),
            member_id_keywords: upper_all(member_id_keywords),
            non_table_prefix: non_table_prefix.trim().to_uppercase(),
        }
    }
}

impl Default for FilterRules {
    fn default() -> Self {
        Self::new(STOP_MARKERS, "NAME", ["MRN", "MBR"], "AUGUST")
    }
}

fn upper_all<'a>(phrases: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    phrases
        .into_iter()
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Lines chosen to go into the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredLines {
    pub lines: Vec<String>,
    /// Index of the input line that matched a stop marker, if any.
    pub halted_at: Option<usize>,
    /// Nothing matched, so `lines` is the whole input.
    pub fallback: bool,
}

impl FilteredLines {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}
