/// Flatten per-page text into trimmed, whitespace-collapsed, non-empty lines.
///
/// Pages that produced no text (`None`) are skipped. Order is page order,
/// then line order within a page.
pub fn normalize_pages<S: AsRef<str>>(pages: &[Option<S>]) -> Vec<String> {
    pages
        .iter()
        .flatten()
        .flat_map(|page| page.as_ref().lines())
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
