//! Phone number recovery for MIS records.
//!
//! Each MIS row gets a `FinalPhone`: the number decoded from its LC2 code when
//! possible, otherwise the phone of the campaign lead whose `seqId` equals the
//! LC2 code minus its `CG` prefix.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::columns::{
    find_col, MatchMode, APPLICATION_REFERENCE_NUMBER, FINAL_DECISION, FINAL_DECISION_DATE,
    LC2_CODE, PHONE_NO, SEQ_ID,
};
use crate::derive::{derive_phone, fallback_key};
use crate::error::ReconError;
use crate::model::{Cell, Table};

pub const FINAL_PHONE: &str = "FinalPhone";

/// Positional fallbacks for the standard MIS extract layout.
const LC2_FALLBACK_INDEX: usize = 10;
const APP_REF_FALLBACK_INDEX: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneSource {
    DerivedFromLc2,
    FromCampaign,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhoneSummary {
    pub total_records: usize,
    pub phones_found: usize,
    pub missing: usize,
    /// Percentage of rows with a phone, 0 when there are no rows.
    pub success_rate: f64,
    pub derived_from_lc2: usize,
    pub from_campaign: usize,
    /// Phone length → number of rows, ascending by length.
    pub length_distribution: BTreeMap<usize, usize>,
}

#[derive(Debug, Clone)]
pub struct PhoneMatch {
    pub table: Table,
    /// Per output row, where its phone came from.
    pub sources: Vec<PhoneSource>,
    pub summary: PhoneSummary,
}

/// Canonical phone form: trimmed, trailing `.0` dropped, digits only.
pub fn normalize_phone(raw: &str) -> String {
    let s = raw.trim();
    let s = s.strip_suffix(".0").unwrap_or(s);
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `seqId` → normalized phone, keeping the first row seen for each id.
///
/// Rows without a `seqId` are ignored; later duplicates are discarded.
pub fn campaign_phone_index(campaign: &Table) -> Result<HashMap<String, String>, ReconError> {
    let seq_col = find_col(campaign, "campaign", &[SEQ_ID], None, MatchMode::Exact)?;
    let phone_col = find_col(campaign, "campaign", &[PHONE_NO], None, MatchMode::Exact)?;

    let mut index: HashMap<String, String> = HashMap::new();
    let mut duplicates = 0usize;
    for row in 0..campaign.len() {
        let Some(seq) = campaign.get(row, seq_col) else { continue };
        let seq = seq.trim().to_uppercase();
        if seq.is_empty() {
            continue;
        }
        if index.contains_key(&seq) {
            duplicates += 1;
            continue;
        }
        let phone = campaign.get(row, phone_col).map(normalize_phone).unwrap_or_default();
        index.insert(seq, phone);
    }
    if duplicates > 0 {
        log::debug!("campaign: dropped {duplicates} duplicate seqId rows (first wins)");
    }
    Ok(index)
}

/// Attach `seqId` and `FinalPhone` to every MIS row.
///
/// Row count and order are preserved. Fails with `MissingColumn` before
/// producing anything if the LC2 or application reference column cannot be
/// resolved.
pub fn match_phones(mis: &Table, campaign: &Table) -> Result<PhoneMatch, ReconError> {
    let lc2_col = find_col(mis, "MIS", &[LC2_CODE], Some(LC2_FALLBACK_INDEX), MatchMode::Exact)?;
    let app_col = find_col(
        mis,
        "MIS",
        &[APPLICATION_REFERENCE_NUMBER],
        Some(APP_REF_FALLBACK_INDEX),
        MatchMode::Exact,
    )?;
    let phones = campaign_phone_index(campaign)?;

    let mut seq_ids: Vec<Cell> = Vec::with_capacity(mis.len());
    let mut final_phones: Vec<Cell> = Vec::with_capacity(mis.len());
    let mut sources = Vec::with_capacity(mis.len());

    for lc2 in mis.column_values(lc2_col) {
        let lc2 = lc2.unwrap_or("").trim();
        if let Some(phone) = derive_phone(lc2) {
            seq_ids.push(None);
            final_phones.push(Some(phone));
            sources.push(PhoneSource::DerivedFromLc2);
            continue;
        }

        let key = Some(fallback_key(lc2)).filter(|k| !k.is_empty());
        let joined = key
            .as_ref()
            .and_then(|k| phones.get(k))
            .filter(|p| !p.is_empty())
            .cloned();
        sources.push(if joined.is_some() { PhoneSource::FromCampaign } else { PhoneSource::Missing });
        seq_ids.push(key);
        final_phones.push(joined);
    }

    let mut working = mis.clone();
    working.rename_column(app_col, APPLICATION_REFERENCE_NUMBER);
    // Previous runs may have left these behind; the fresh values replace them.
    let stale: Vec<usize> = working
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| *c == SEQ_ID || *c == FINAL_PHONE)
        .map(|(i, _)| i)
        .collect();
    let keep: Vec<usize> = (0..working.width()).filter(|i| !stale.contains(i)).collect();
    let mut working = working.select(&keep);
    working.add_column(SEQ_ID, seq_ids);
    working.add_column(FINAL_PHONE, final_phones);

    let table = working.select(&output_order(&working));
    let summary = summarize(&table, &sources);

    log::info!(
        "phones: {} of {} MIS rows resolved ({} derived, {} from campaign)",
        summary.phones_found,
        summary.total_records,
        summary.derived_from_lc2,
        summary.from_campaign
    );

    Ok(PhoneMatch { table, sources, summary })
}

/// Reference, decision columns, join key and phone first; everything else after.
fn output_order(table: &Table) -> Vec<usize> {
    let priority = [
        APPLICATION_REFERENCE_NUMBER,
        FINAL_DECISION,
        FINAL_DECISION_DATE,
        SEQ_ID,
        FINAL_PHONE,
    ];
    let mut order: Vec<usize> = priority.iter().filter_map(|p| table.column_index(p)).collect();
    let rest: Vec<usize> = (0..table.width()).filter(|i| !order.contains(i)).collect();
    order.extend(rest);
    order
}

fn summarize(table: &Table, sources: &[PhoneSource]) -> PhoneSummary {
    let total_records = table.len();
    let derived_from_lc2 = sources.iter().filter(|s| **s == PhoneSource::DerivedFromLc2).count();
    let from_campaign = sources.iter().filter(|s| **s == PhoneSource::FromCampaign).count();
    let phones_found = derived_from_lc2 + from_campaign;

    let mut length_distribution = BTreeMap::new();
    if let Some(col) = table.column_index(FINAL_PHONE) {
        for phone in table.column_values(col).flatten() {
            *length_distribution.entry(phone.chars().count()).or_insert(0) += 1;
        }
    }

    PhoneSummary {
        total_records,
        phones_found,
        missing: total_records - phones_found,
        success_rate: if total_records > 0 {
            phones_found as f64 / total_records as f64 * 100.0
        } else {
            0.0
        },
        derived_from_lc2,
        from_campaign,
        length_distribution,
    }
}

/// Rows of the processing summary sheet: metric name → display value.
pub fn summary_table(summary: &PhoneSummary) -> Table {
    let rows = vec![
        ("Total Records", summary.total_records.to_string()),
        ("Phone Numbers Found", summary.phones_found.to_string()),
        ("Success Rate", format!("{:.1}%", summary.success_rate)),
        ("Missing Numbers", summary.missing.to_string()),
        ("Derived from LC2", summary.derived_from_lc2.to_string()),
        ("From Campaign Data", summary.from_campaign.to_string()),
    ];
    Table::from_rows(
        vec!["Metric".into(), "Value".into()],
        rows.into_iter().map(|(m, v)| vec![Some(m.to_string()), Some(v)]).collect(),
    )
}
