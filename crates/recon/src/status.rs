//! Final decision status counts over a date window.

use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::columns::find_column_by_keywords;
use crate::dates::parse_datetime;
use crate::error::ReconError;
use crate::model::{Cell, Table};

pub const MAPPED_STATUS: &str = "mapped_status";

const CREATION_KEYWORDS: &[&str] = &["created", "creation", "date"];
const DECISION_DATE_KEYWORDS: &[&str] = &["final_decision_date", "decision_date", "final date"];
const STATUS_KEYWORDS: &[&str] = &["final_decision", "final_status"];
const IPA_KEYWORDS: &[&str] = &["ipa_status", "ipa status"];

/// Dates on or before this are placeholders, not real timestamps.
fn earliest_valid() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MappedStatus {
    #[serde(rename = "Card Out")]
    CardOut,
    Declined,
    Inprogress,
    Other,
}

impl MappedStatus {
    pub const ALL: [MappedStatus; 4] = [Self::CardOut, Self::Declined, Self::Inprogress, Self::Other];

    /// Map a raw FINAL_DECISION value. Case and surrounding whitespace are ignored.
    pub fn from_decision(decision: Option<&str>) -> Self {
        let upper = decision.map(|d| d.trim().to_uppercase()).unwrap_or_default();
        match upper.as_str() {
            "APPROVE" => Self::CardOut,
            "IPA REJECT" | "DECLINE" => Self::Declined,
            "IPA APPROVED DROPOFF CASE" | "INPROCESS" => Self::Inprogress,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CardOut => "Card Out",
            Self::Declined => "Declined",
            Self::Inprogress => "Inprogress",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for MappedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which date column(s) the window applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterBy {
    #[default]
    Creation,
    Decision,
    /// Created on/after `from` and decided on/before `to`.
    Both,
}

impl std::str::FromStr for FilterBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "creation" => Ok(Self::Creation),
            "decision" => Ok(Self::Decision),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown filter '{other}' (expected creation, decision or both)")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusQuery {
    pub filter_by: FilterBy,
    /// Inclusive; defaults to the earliest valid date in the filtered column.
    pub from: Option<NaiveDate>,
    /// Inclusive of the whole day; defaults to the latest valid date.
    pub to: Option<NaiveDate>,
}

/// Where each role was found in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusColumns {
    pub creation: Option<String>,
    pub decision_date: Option<String>,
    pub final_status: Option<String>,
    pub ipa_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total_applications: usize,
    pub ipa_approved: usize,
    pub card_out: usize,
    pub declined: usize,
    pub inprogress: usize,
    pub other: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub stage: String,
    pub count: usize,
    /// Share of the first stage, 0 when the first stage is empty.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub columns: StatusColumns,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub counts: StatusCounts,
    pub funnel: Vec<FunnelStage>,
    #[serde(skip)]
    pub rows: Table,
}

/// Filter `mis` to the requested window and count decisions.
pub fn analyze_status(mis: &Table, query: &StatusQuery) -> Result<StatusReport, ReconError> {
    let creation_col = find_column_by_keywords(mis, CREATION_KEYWORDS);
    let decision_col = find_column_by_keywords(mis, DECISION_DATE_KEYWORDS);
    let status_col = find_column_by_keywords(mis, STATUS_KEYWORDS);
    let ipa_col = find_column_by_keywords(mis, IPA_KEYWORDS);

    if creation_col.is_none() && decision_col.is_none() {
        return Err(ReconError::NoDateColumns { available: mis.columns.clone() });
    }
    let name = |c: Option<usize>| c.map(|i| mis.columns[i].clone());
    let columns = StatusColumns {
        creation: name(creation_col),
        decision_date: name(decision_col),
        final_status: name(status_col),
        ipa_status: name(ipa_col),
    };
    log::debug!("status: resolved columns {columns:?}");

    let parse = |col: Option<usize>| -> Vec<Option<NaiveDateTime>> {
        match col {
            Some(c) => mis.column_values(c).map(|v| v.and_then(parse_datetime)).collect(),
            None => vec![None; mis.len()],
        }
    };
    let created = parse(creation_col);
    let decided = parse(decision_col);

    let require = |col: Option<usize>, keywords: &[&str]| {
        col.ok_or_else(|| ReconError::MissingColumn {
            dataset: "MIS".to_string(),
            aliases: keywords.iter().map(|k| k.to_string()).collect(),
        })
    };

    // Both: creation in [from, last creation], decision in [first decision, to].
    let (from, to, creation_max, decision_min) = match query.filter_by {
        FilterBy::Creation => {
            let c = require(creation_col, CREATION_KEYWORDS)?;
            let (min, max) = bounds(&created, &mis.columns[c])?;
            (query.from.unwrap_or(min), query.to.unwrap_or(max), max, min)
        }
        FilterBy::Decision => {
            let c = require(decision_col, DECISION_DATE_KEYWORDS)?;
            let (min, max) = bounds(&decided, &mis.columns[c])?;
            (query.from.unwrap_or(min), query.to.unwrap_or(max), max, min)
        }
        FilterBy::Both => {
            let c = require(creation_col, CREATION_KEYWORDS)?;
            let d = require(decision_col, DECISION_DATE_KEYWORDS)?;
            let (created_min, created_max) = bounds(&created, &mis.columns[c])?;
            let (decided_min, decided_max) = bounds(&decided, &mis.columns[d])?;
            (query.from.unwrap_or(created_min), query.to.unwrap_or(decided_max), created_max, decided_min)
        }
    };

    let between = |dt: Option<NaiveDateTime>, lo: NaiveDate, hi: NaiveDate| {
        dt.is_some_and(|dt| dt.date() >= lo && dt.date() <= hi)
    };
    let mut rows = mis.filter_rows(|row| match query.filter_by {
        FilterBy::Creation => between(created[row], from, to),
        FilterBy::Decision => between(decided[row], from, to),
        FilterBy::Both => {
            between(created[row], from, creation_max) && between(decided[row], decision_min, to)
        }
    });

    if rows.is_empty() {
        return Err(ReconError::NoRecordsInRange { range: format!("{from} to {to}") });
    }

    let mut by_status: HashMap<MappedStatus, usize> = HashMap::new();
    if let Some(c) = status_col {
        let mapped: Vec<Cell> = rows
            .column_values(c)
            .map(|v| {
                let status = MappedStatus::from_decision(v);
                *by_status.entry(status).or_insert(0) += 1;
                Some(status.label().to_string())
            })
            .collect();
        rows.add_column(MAPPED_STATUS, mapped);
    }
    let ipa_approved = ipa_col.map_or(0, |c| {
        rows.column_values(c)
            .filter(|v| v.is_some_and(|s| s.trim().eq_ignore_ascii_case("APPROVE")))
            .count()
    });

    let count = |s: MappedStatus| by_status.get(&s).copied().unwrap_or(0);
    let counts = StatusCounts {
        total_applications: rows.len(),
        ipa_approved,
        card_out: count(MappedStatus::CardOut),
        declined: count(MappedStatus::Declined),
        inprogress: count(MappedStatus::Inprogress),
        other: count(MappedStatus::Other),
    };
    let funnel = funnel(&counts);

    log::info!("status: {} applications between {from} and {to}", counts.total_applications);

    Ok(StatusReport { columns, from, to, counts, funnel, rows })
}

/// Earliest and latest valid dates of a parsed column.
fn bounds(parsed: &[Option<NaiveDateTime>], column: &str) -> Result<(NaiveDate, NaiveDate), ReconError> {
    let floor = earliest_valid();
    let valid = || parsed.iter().flatten().filter(|dt| **dt > floor);
    match (valid().min(), valid().max()) {
        (Some(min), Some(max)) => Ok((min.date(), max.date())),
        _ => Err(ReconError::NoValidDates { column: column.to_string() }),
    }
}

/// Total → IPA Approved → Card Out, each as a share of the total.
pub fn funnel(counts: &StatusCounts) -> Vec<FunnelStage> {
    let stages = [
        ("Total Applications", counts.total_applications),
        ("IPA Approved", counts.ipa_approved),
        ("Card Out", counts.card_out),
    ];
    let initial = counts.total_applications;
    stages
        .into_iter()
        .map(|(stage, count)| FunnelStage {
            stage: stage.to_string(),
            count,
            percentage: if initial > 0 { count as f64 / initial as f64 * 100.0 } else { 0.0 },
        })
        .collect()
}

/// Value → row count for one column, most frequent first, ties by value.
///
/// Nulls are counted under an empty label.
pub fn value_breakdown(table: &Table, col: usize, top_n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in table.column_values(col) {
        *counts.entry(v.unwrap_or("").trim().to_string()).or_insert(0) += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.truncate(top_n);
    counts
}

/// Status counts as a two-column sheet.
pub fn counts_table(counts: &StatusCounts) -> Table {
    let rows = [
        ("Total Applications", counts.total_applications),
        ("IPA Approved", counts.ipa_approved),
        ("Card Out", counts.card_out),
        ("Declined", counts.declined),
        ("Inprogress", counts.inprogress),
        ("Other", counts.other),
    ];
    Table::from_rows(
        vec!["Status".into(), "Count".into()],
        rows.iter().map(|(s, c)| vec![Some(s.to_string()), Some(c.to_string())]).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Cell {
        if s.is_empty() { None } else { Some(s.to_string()) }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn mis() -> Table {
        Table::from_rows(
            vec![
                "APPLICATION_REFERENCE_NUMBER".into(),
                "CREATION_DATE_TIME*".into(),
                "FINAL_DECISION".into(),
                "FINAL_DECISION_DATE".into(),
                "IPA_STATUS".into(),
            ],
            vec![
                vec![cell("A1"), cell("01/03/2024 10:00"), cell("Approve"), cell("2024-03-05"), cell("APPROVE")],
                vec![cell("A2"), cell("02/03/2024 23:30"), cell("Decline"), cell("2024-03-06"), cell("approve")],
                vec![cell("A3"), cell("10/03/2024"), cell("IPA REJECT"), cell("2024-03-20"), cell("REJECT")],
                vec![cell("A4"), cell("15/03/2024"), cell("Inprocess"), cell(""), cell("")],
                vec![cell("A5"), cell("1970-01-01"), cell("whatever"), cell("2024-03-01"), cell("")],
            ],
        )
    }

    #[test]
    fn status_mapping() {
        assert_eq!(MappedStatus::from_decision(Some(" approve ")), MappedStatus::CardOut);
        assert_eq!(MappedStatus::from_decision(Some("IPA REJECT")), MappedStatus::Declined);
        assert_eq!(MappedStatus::from_decision(Some("decline")), MappedStatus::Declined);
        assert_eq!(
            MappedStatus::from_decision(Some("IPA Approved Dropoff Case")),
            MappedStatus::Inprogress
        );
        assert_eq!(MappedStatus::from_decision(Some("INPROCESS")), MappedStatus::Inprogress);
        assert_eq!(MappedStatus::from_decision(Some("REFER")), MappedStatus::Other);
        assert_eq!(MappedStatus::from_decision(None), MappedStatus::Other);
    }

    #[test]
    fn creation_window_defaults_to_valid_range() {
        let report = analyze_status(&mis(), &StatusQuery::default()).unwrap();
        assert_eq!(report.from, d(2024, 3, 1));
        assert_eq!(report.to, d(2024, 3, 15));
        // The 1970 placeholder row is outside the default window.
        assert_eq!(report.counts.total_applications, 4);
        assert_eq!(report.counts.card_out, 1);
        assert_eq!(report.counts.declined, 2);
        assert_eq!(report.counts.inprogress, 1);
        assert_eq!(report.counts.other, 0);
        assert_eq!(report.counts.ipa_approved, 2);
        assert_eq!(report.rows.columns.last().map(String::as_str), Some(MAPPED_STATUS));
    }

    #[test]
    fn end_date_includes_the_whole_day() {
        let q = StatusQuery { filter_by: FilterBy::Creation, from: Some(d(2024, 3, 2)), to: Some(d(2024, 3, 2)) };
        let report = analyze_status(&mis(), &q).unwrap();
        assert_eq!(report.counts.total_applications, 1);
        assert_eq!(report.rows.get(0, 0), Some("A2"));
    }

    #[test]
    fn decision_window() {
        let q = StatusQuery { filter_by: FilterBy::Decision, from: Some(d(2024, 3, 5)), to: Some(d(2024, 3, 6)) };
        let report = analyze_status(&mis(), &q).unwrap();
        assert_eq!(report.counts.total_applications, 2);
    }

    #[test]
    fn both_dates_mode() {
        let q = StatusQuery { filter_by: FilterBy::Both, from: Some(d(2024, 3, 2)), to: Some(d(2024, 3, 10)) };
        let report = analyze_status(&mis(), &q).unwrap();
        let apps: Vec<_> = report.rows.column_values(0).collect();
        assert_eq!(apps, vec![Some("A2")]);
    }

    #[test]
    fn both_dates_mode_skips_placeholder_decisions() {
        let mut t = mis();
        t.rows[0][3] = cell("1970-01-01");
        let q = StatusQuery { filter_by: FilterBy::Both, from: Some(d(2024, 1, 1)), to: None };
        let report = analyze_status(&t, &q).unwrap();
        let apps: Vec<_> = report.rows.column_values(0).collect();
        assert_eq!(apps, vec![Some("A2"), Some("A3")]);
    }

    #[test]
    fn empty_window_is_an_error() {
        let q = StatusQuery { filter_by: FilterBy::Creation, from: Some(d(2030, 1, 1)), to: Some(d(2030, 1, 2)) };
        assert!(matches!(analyze_status(&mis(), &q), Err(ReconError::NoRecordsInRange { .. })));
    }

    #[test]
    fn no_date_columns() {
        let t = Table::new(vec!["APPLICATION_REFERENCE_NUMBER".into(), "FINAL_DECISION".into()]);
        assert!(matches!(
            analyze_status(&t, &StatusQuery::default()),
            Err(ReconError::NoDateColumns { .. })
        ));
    }

    #[test]
    fn funnel_percentages() {
        let report = analyze_status(&mis(), &StatusQuery::default()).unwrap();
        let f = &report.funnel;
        assert_eq!(f.len(), 3);
        assert_eq!(f[0].percentage, 100.0);
        assert_eq!(f[1].percentage, 50.0);
        assert_eq!(f[2].percentage, 25.0);
    }

    #[test]
    fn breakdown_orders_by_count() {
        let t = Table::from_rows(
            vec!["branch".into()],
            vec![vec![cell("B")], vec![cell("A")], vec![cell("B")], vec![cell("C")]],
        );
        assert_eq!(
            value_breakdown(&t, 0, 2),
            vec![("B".to_string(), 2), ("A".to_string(), 1)]
        );
    }

    #[test]
    fn filter_by_parses() {
        assert_eq!("Decision".parse::<FilterBy>(), Ok(FilterBy::Decision));
        assert!("weekly".parse::<FilterBy>().is_err());
    }
}
