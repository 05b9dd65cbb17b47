//! Title normalization and canonical destination naming
//!
//! Raw title fragments come out of the classifier in whatever spelling
//! the release used (`Show.Name`, `Show_Name`, `Show - Name`). This
//! module turns them into a single canonical, display-ready show name:
//! separators become spaces, an optional alias table rewrites the whole
//! title, and a production year found in the original file name is
//! appended as a ` (YYYY)` suffix. The mapping is many-to-one and
//! deterministic - the same raw spelling, file name and alias table
//! always produce the same canonical name.

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;

// 4-digit token in 1200-2999, optionally bracketed, bounded by
// non-alphanumerics on both sides
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9A-Za-z])[\(\[]?((?:1[2-9]|2[0-9])\d{2})[\)\]]?(?:[^0-9A-Za-z]|$)")
        .unwrap()
});

static ENDS_WITH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d{4}\)$").unwrap());

/// Replace `.`, `_` and `-` with spaces, collapse whitespace runs and trim.
pub fn clean_title(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if matches!(c, '.' | '_' | '-') { ' ' } else { c })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First 4-digit year token (1200-2999) found in `file_name`.
pub fn infer_year(file_name: &str) -> Option<u16> {
    let caps = YEAR_RE.captures(file_name)?;
    caps[1].parse::<u16>().ok()
}

/// Exact-match title substitution table.
///
/// One `key = value` entry per line; `#` comments and blank lines are
/// ignored, and the first occurrence of a duplicate key wins. Keys are
/// matched against cleaned titles with no partial or fuzzy matching.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn parse(contents: &str) -> Self {
        let mut entries = HashMap::new();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("alias table line {} has no '=', ignoring", lineno + 1);
                continue;
            };
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            if key.is_empty() || value.is_empty() {
                tracing::warn!("alias table line {} is incomplete, ignoring", lineno + 1);
                continue;
            }
            entries.entry(key).or_insert(value);
        }
        Self { entries }
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading alias table {:?}", path))?;
        let table = Self::parse(&contents);
        tracing::debug!("loaded {} alias entries from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn resolve(&self, title: &str) -> Option<&str> {
        self.entries.get(title).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the canonical show name used as a destination path segment.
///
/// Alias substitution runs before year inference; at most one year is
/// appended and never when the (possibly aliased) title already ends in
/// `(YYYY)`.
pub fn canonical_show_name(raw_title: &str, file_name: &str, aliases: &AliasTable) -> String {
    let mut title = clean_title(raw_title);
    if let Some(replacement) = aliases.resolve(&title) {
        title = replacement.to_string();
    }
    if !ENDS_WITH_YEAR_RE.is_match(&title) {
        if let Some(year) = infer_year(file_name) {
            title = format!("{title} ({year})");
        }
    }
    title
}
