//! Google Ads campaign leads matched against the MIS extract.
//!
//! A MIS row belongs to a campaign lead when its LC2 code is `CG` followed by
//! the lead's `seqId`. Matched rows pick up the lead's click id; campaign rows
//! are flagged with whether they made it into MIS at all.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::columns::{
    find_col, find_optional_col, MatchMode, APPLICATION_REFERENCE_NUMBER, CREATION_DATE_TIME,
    FINAL_DECISION, FINAL_DECISION_DATE, LC1_CODE, LC2_CODE, LG_CODE, SEQ_ID, UTM_GCLID,
    UTM_SOURCE,
};
use crate::dates::normalize_date;
use crate::error::ReconError;
use crate::model::{non_empty, Cell, Table};
use crate::pivot::{pivot_count, Pivot};

pub const PRESENT_IN_MIS: &str = "Present in MIS";

const LC2_FALLBACK_INDEX: usize = 10;
const LG_FALLBACK_INDEX: usize = 11;
const LC1_FALLBACK_INDEX: usize = 9;
const APP_REF_FALLBACK_INDEX: usize = 0;

/// Which campaign leads count as Google Ads traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleAdsRules {
    /// Accepted `lead_utm_source` values, lower-case.
    pub utm_sources: Vec<String>,
}

impl Default for GoogleAdsRules {
    fn default() -> Self {
        Self {
            utm_sources: ["ad_cc", "adword_cc", "hdcc_cc", "hdcc_cn"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl GoogleAdsRules {
    pub fn accepts(&self, source: Option<&str>) -> bool {
        let Some(source) = source else { return false };
        let source = source.trim().to_lowercase();
        self.utm_sources.iter().any(|s| s.trim().eq_ignore_ascii_case(&source))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleAdsSummary {
    pub total_campaigns: usize,
    pub matched_in_mis: usize,
    pub present_in_mis: usize,
    /// matched / total campaigns × 100, 0 when there are no campaigns.
    pub match_rate: f64,
}

#[derive(Debug, Clone)]
pub struct GoogleAdsMatch {
    /// MIS rows belonging to a campaign lead, with `seqId` and `lead_utm_gclid`.
    pub matched: Table,
    /// Every filtered campaign row plus `Present in MIS`.
    pub campaigns: Table,
    /// Creation date × decision counts; `None` when it cannot be built.
    pub pivot: Option<Pivot>,
    pub summary: GoogleAdsSummary,
}

/// Keep the campaign rows whose `lead_utm_source` is accepted by `rules`.
pub fn filter_google_campaigns(campaign: &Table, rules: &GoogleAdsRules) -> Result<Table, ReconError> {
    let source_col = find_col(campaign, "campaign", &[UTM_SOURCE], None, MatchMode::Exact)?;
    let filtered = campaign.filter_rows(|row| rules.accepts(campaign.get(row, source_col)));
    log::debug!(
        "google ads: {} of {} campaign rows pass the source filter",
        filtered.len(),
        campaign.len()
    );
    Ok(filtered)
}

/// Match already-filtered Google Ads campaign rows against MIS.
pub fn match_google_ads(google: &Table, mis: &Table) -> Result<GoogleAdsMatch, ReconError> {
    let mode = MatchMode::ExactThenContains;
    let lc2_col = find_col(mis, "MIS", &[LC2_CODE], Some(LC2_FALLBACK_INDEX), mode)?;
    find_col(mis, "MIS", &[LG_CODE], Some(LG_FALLBACK_INDEX), mode)?;
    find_col(mis, "MIS", &[LC1_CODE], Some(LC1_FALLBACK_INDEX), mode)?;
    let app_col = find_col(mis, "MIS", &[APPLICATION_REFERENCE_NUMBER], Some(APP_REF_FALLBACK_INDEX), mode)?;
    let date_col = find_optional_col(mis, &[CREATION_DATE_TIME], mode);
    let decision_col = find_optional_col(mis, &[FINAL_DECISION], mode);

    let seq_col = find_col(google, "campaign", &[SEQ_ID], None, MatchMode::Exact)?;
    let gclid_col = find_col(google, "campaign", &[UTM_GCLID], None, MatchMode::Exact)?;

    // Campaign seqIds, trimmed and upper-cased. Blank ids never match.
    let campaign_keys: Vec<Option<String>> = google
        .column_values(seq_col)
        .map(|s| non_empty(s).map(str::to_uppercase))
        .collect();
    let candidates: HashSet<String> = campaign_keys.iter().flatten().map(|k| format!("CG{k}")).collect();

    let mut working = mis.clone();
    working.map_column(lc2_col, |v| Some(v.unwrap_or("").trim().to_uppercase()));
    let mut matched = working.filter_rows(|row| {
        working.get(row, lc2_col).is_some_and(|lc2| candidates.contains(lc2))
    });

    let mut matched_keys = HashSet::new();
    if !matched.is_empty() {
        let seq_ids: Vec<Cell> = matched
            .column_values(lc2_col)
            .map(|lc2| lc2.map(|v| v.strip_prefix("CG").unwrap_or(v).trim().to_string()))
            .collect();
        matched_keys.extend(seq_ids.iter().flatten().cloned());

        let gclids = gclid_lookup(google, &campaign_keys, gclid_col)?;
        let joined: Vec<Cell> = seq_ids
            .iter()
            .map(|k| k.as_ref().and_then(|k| gclids.get(k).cloned().flatten()))
            .collect();
        matched.add_column(SEQ_ID, seq_ids);
        matched.add_column(UTM_GCLID, joined);
    }

    let mut campaigns = google.clone();
    let present: Vec<Cell> = campaign_keys
        .iter()
        .map(|k| {
            let hit = k.as_ref().is_some_and(|k| matched_keys.contains(k));
            Some(if hit { "Yes" } else { "No" }.to_string())
        })
        .collect();
    campaigns.add_column(PRESENT_IN_MIS, present);

    let pivot = match (date_col, decision_col) {
        (Some(date_col), Some(decision_col)) if !matched.is_empty() => {
            matched.map_column(decision_col, |v| v.map(|d| d.trim().to_uppercase()));
            matched.map_column(date_col, normalize_date);
            if let Some(col) = matched.column_index(FINAL_DECISION_DATE) {
                matched.map_column(col, normalize_date);
            }
            Some(pivot_count(&matched, date_col, decision_col, app_col)).filter(|p| !p.is_empty())
        }
        _ => None,
    };

    let total_campaigns = google.len();
    let present_in_mis = campaigns
        .column_values(campaigns.width() - 1)
        .filter(|v| *v == Some("Yes"))
        .count();
    let summary = GoogleAdsSummary {
        total_campaigns,
        matched_in_mis: matched.len(),
        present_in_mis,
        match_rate: if total_campaigns > 0 {
            matched.len() as f64 / total_campaigns as f64 * 100.0
        } else {
            0.0
        },
    };

    log::info!(
        "google ads: {} campaigns, {} matched MIS rows, {} present",
        summary.total_campaigns,
        summary.matched_in_mis,
        summary.present_in_mis
    );

    Ok(GoogleAdsMatch { matched, campaigns, pivot, summary })
}

/// Distinct `(seqId, gclid)` pairs keyed by seqId.
///
/// A seqId carrying two different click ids would fan out a many-to-one join,
/// so it is rejected.
fn gclid_lookup(
    google: &Table,
    keys: &[Option<String>],
    gclid_col: usize,
) -> Result<HashMap<String, Option<String>>, ReconError> {
    let mut pairs: BTreeMap<String, Vec<Option<String>>> = BTreeMap::new();
    for (row, key) in keys.iter().enumerate() {
        let Some(key) = key else { continue };
        let gclid = google.get(row, gclid_col).map(str::to_string);
        let seen = pairs.entry(key.clone()).or_default();
        if !seen.contains(&gclid) {
            seen.push(gclid);
        }
    }

    let mut lookup = HashMap::with_capacity(pairs.len());
    for (key, mut gclids) in pairs {
        if gclids.len() > 1 {
            return Err(ReconError::ManyToOneViolation { key, rows: gclids.len() });
        }
        lookup.insert(key, gclids.pop().flatten());
    }
    Ok(lookup)
}

/// Rows of the summary sheet: metric name → display value.
pub fn summary_table(summary: &GoogleAdsSummary) -> Table {
    let rows = vec![
        ("Total Campaigns", summary.total_campaigns.to_string()),
        ("Matched in MIS", summary.matched_in_mis.to_string()),
        ("Present in MIS", summary.present_in_mis.to_string()),
        ("Match Rate", format!("{:.1}%", summary.match_rate)),
    ];
    Table::from_rows(
        vec!["Metric".into(), "Value".into()],
        rows.into_iter().map(|(m, v)| vec![Some(m.to_string()), Some(v)]).collect(),
    )
}
