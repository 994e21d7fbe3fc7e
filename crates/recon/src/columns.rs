//! Header resolution for user-supplied spreadsheets.
//!
//! Uploaded MIS extracts drift: headers gain whitespace, change case, or pick
//! up suffixes. Lookups here are case-insensitive and trimmed, and fall back
//! to a fixed position where the extract layout is known.

use crate::error::ReconError;
use crate::model::Table;

// Canonical column names.
pub const APPLICATION_REFERENCE_NUMBER: &str = "APPLICATION_REFERENCE_NUMBER";
pub const LC2_CODE: &str = "LC2_CODE";
pub const LC1_CODE: &str = "LC1_CODE";
pub const LG_CODE: &str = "LG_CODE";
pub const FINAL_DECISION: &str = "FINAL_DECISION";
pub const FINAL_DECISION_DATE: &str = "FINAL_DECISION_DATE";
pub const CREATION_DATE_TIME: &str = "CREATION_DATE_TIME";

pub const SEQ_ID: &str = "seqId";
pub const PHONE_NO: &str = "phoneNo";
pub const UTM_SOURCE: &str = "lead_utm_source";
pub const UTM_MEDIUM: &str = "lead_utm_medium";
pub const UTM_GCLID: &str = "lead_utm_gclid";
pub const STORE_SLUG: &str = "storeSlug";

/// How aliases are compared against headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Whole header equals an alias.
    Exact,
    /// Whole header first, then any header containing an alias.
    ExactThenContains,
}

/// Resolve a column by alias list, then by position.
///
/// Returns `MissingColumn` naming the alias list when nothing applies.
pub fn find_col(
    table: &Table,
    dataset: &str,
    aliases: &[&str],
    fallback_index: Option<usize>,
    mode: MatchMode,
) -> Result<usize, ReconError> {
    let lowered: Vec<String> = table.columns.iter().map(|c| c.trim().to_lowercase()).collect();

    for alias in aliases {
        let alias = alias.trim().to_lowercase();
        if let Some(i) = lowered.iter().position(|c| *c == alias) {
            return Ok(i);
        }
    }

    if mode == MatchMode::ExactThenContains {
        for (i, col) in lowered.iter().enumerate() {
            if aliases.iter().any(|a| col.contains(&a.trim().to_lowercase())) {
                return Ok(i);
            }
        }
    }

    if let Some(i) = fallback_index {
        if i < table.width() {
            log::debug!("{dataset}: {aliases:?} not found, using column {i} ('{}')", table.columns[i]);
            return Ok(i);
        }
    }

    Err(ReconError::MissingColumn {
        dataset: dataset.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    })
}

/// Like [`find_col`] but absence is not an error.
pub fn find_optional_col(table: &Table, aliases: &[&str], mode: MatchMode) -> Option<usize> {
    find_col(table, "", aliases, None, mode).ok()
}

/// First column (in table order) whose cleaned header contains any keyword.
///
/// Cleaning trims, drops `*` markers and lower-cases.
pub fn find_column_by_keywords(table: &Table, keywords: &[&str]) -> Option<usize> {
    table.columns.iter().position(|col| {
        let clean = col.trim().replace('*', "").to_lowercase();
        keywords.iter().any(|k| clean.contains(&k.to_lowercase()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(cols: &[&str]) -> Table {
        Table::new(cols.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn exact_match_is_case_insensitive_and_trimmed() {
        let t = table(&["app", " lc2_code "]);
        assert_eq!(find_col(&t, "MIS", &["LC2_CODE"], None, MatchMode::Exact), Ok(1));
    }

    #[test]
    fn contains_match_only_in_contains_mode() {
        let t = table(&["APP", "MY_LC2_CODE_X"]);
        assert!(find_col(&t, "MIS", &["LC2_CODE"], None, MatchMode::Exact).is_err());
        assert_eq!(
            find_col(&t, "MIS", &["LC2_CODE"], None, MatchMode::ExactThenContains),
            Ok(1)
        );
    }

    #[test]
    fn exact_beats_contains() {
        let t = table(&["LC2_CODE_OLD", "LC2_CODE"]);
        assert_eq!(
            find_col(&t, "MIS", &["LC2_CODE"], None, MatchMode::ExactThenContains),
            Ok(1)
        );
    }

    #[test]
    fn positional_fallback() {
        let t = table(&["a", "b", "c"]);
        assert_eq!(find_col(&t, "MIS", &["LC2_CODE"], Some(2), MatchMode::Exact), Ok(2));
    }

    #[test]
    fn out_of_range_fallback_is_missing_column() {
        let t = table(&["a", "b"]);
        let err = find_col(&t, "MIS", &["LC2_CODE"], Some(10), MatchMode::Exact).unwrap_err();
        assert_eq!(
            err,
            ReconError::MissingColumn { dataset: "MIS".into(), aliases: vec!["LC2_CODE".into()] }
        );
        assert!(err.to_string().contains("LC2_CODE"));
    }

    #[test]
    fn keywords_take_first_column_in_order() {
        let t = table(&["APPLICATION_REFERENCE_NUMBER", "CREATION_DATE_TIME*", "FINAL_DECISION_DATE"]);
        assert_eq!(find_column_by_keywords(&t, &["created", "creation", "date"]), Some(1));
        assert_eq!(find_column_by_keywords(&t, &["ipa_status"]), None);
    }
}
