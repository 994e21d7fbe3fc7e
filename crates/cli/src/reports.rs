// Reconciliation commands: derive, phones, google-ads, status

use std::fs;
use std::path::{Path, PathBuf};

use cardops_io::xlsx::{self, SheetData};
use cardops_io::FileFormat;
use cardops_recon::columns::{find_optional_col, MatchMode};
use cardops_recon::derive::{derive_phone_with_scheme, Scheme};
use cardops_recon::status::{counts_table, value_breakdown, FilterBy, FunnelStage};
use cardops_recon::{
    analyze_status, filter_google_campaigns, google_ads, match_google_ads, match_phones, phone,
    GoogleAdsRules, ReconError, StatusQuery, Table,
};
use chrono::{Local, NaiveDate};
use serde_json::json;

use crate::util::render_table;
use crate::{mail, CliError, Context, Source};

/// Rows shown when results are printed instead of written.
const PREVIEW_ROWS: usize = 20;

// ============================================================================
// Sources and outputs
// ============================================================================

pub(crate) fn load_mis(ctx: &Context, source: &Source) -> Result<Table, CliError> {
    match source {
        Source::File(path) => load_file(path),
        Source::Db => ctx.open_store()?.load_mis().map_err(|e| {
            CliError::from(e).with_hint("load an extract first with `cardops mis upload <FILE>`")
        }),
    }
}

pub(crate) fn load_campaign(ctx: &Context, source: &Source) -> Result<Table, CliError> {
    match source {
        Source::File(path) => load_file(path),
        Source::Db => Ok(ctx.open_store()?.load_campaign(&ctx.settings.bank.store_filter)?),
    }
}

fn load_file(path: &Path) -> Result<Table, CliError> {
    if !path.exists() {
        return Err(CliError::io(format!("file not found: {}", path.display())));
    }
    let mut table = cardops_io::import(path).map_err(CliError::io)?;
    table.trim_headers();
    Ok(table)
}

/// Output format from the path; Excel output must be `.xlsx`.
pub(crate) fn output_format(path: &Path) -> Result<FileFormat, CliError> {
    let format = FileFormat::from_path(path).map_err(CliError::usage)?;
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if format == FileFormat::Excel && !is_xlsx {
        return Err(CliError::usage(format!("{}: Excel output must be .xlsx", path.display())));
    }
    Ok(format)
}

/// Excel gets every sheet; other formats get the first sheet's table.
pub(crate) fn write_output(path: &Path, sheets: &[SheetData<'_>]) -> Result<(), CliError> {
    let format = output_format(path)?;
    let Some(first) = sheets.first() else {
        return Err(CliError::general("nothing to write"));
    };
    match format {
        FileFormat::Excel => xlsx::export(sheets, path),
        _ => cardops_io::export(first.table, path, first.name),
    }
    .map_err(CliError::io)?;
    eprintln!("wrote {} rows to {}", first.table.len(), path.display());
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::general(e.to_string()))?;
    println!("{text}");
    Ok(())
}

// ============================================================================
// derive
// ============================================================================

pub(crate) fn cmd_derive(codes: &[String], json: bool) -> Result<(), CliError> {
    let derived: Vec<(&str, Option<(String, Scheme)>)> =
        codes.iter().map(|c| (c.as_str(), derive_phone_with_scheme(c))).collect();

    if json {
        let items: Vec<serde_json::Value> = derived
            .iter()
            .map(|(code, result)| {
                let (phone, scheme) = match result {
                    Some((phone, Scheme::Base36)) => (Some(phone.as_str()), Some("base36")),
                    Some((phone, Scheme::Letters)) => (Some(phone.as_str()), Some("letters")),
                    None => (None, None),
                };
                json!({ "code": code, "phone": phone, "scheme": scheme })
            })
            .collect();
        return print_json(&serde_json::Value::Array(items));
    }

    for (code, result) in &derived {
        let phone = result.as_ref().map(|(p, _)| p.as_str()).unwrap_or("-");
        println!("{code}\t{phone}");
    }
    Ok(())
}

// ============================================================================
// phones
// ============================================================================

pub(crate) fn cmd_phones(
    ctx: &Context,
    mis: &Source,
    campaign: &Source,
    output: Option<&Path>,
    json: bool,
) -> Result<(), CliError> {
    if let Some(path) = output {
        output_format(path)?;
    }
    let mis = load_mis(ctx, mis)?;
    let campaign = load_campaign(ctx, campaign)?;
    let matched = match_phones(&mis, &campaign)?;
    let summary_sheet = phone::summary_table(&matched.summary);

    if let Some(path) = output {
        write_output(
            path,
            &[
                SheetData::new("Phone Numbers", &matched.table),
                SheetData::new("Processing Summary", &summary_sheet),
            ],
        )?;
    }

    if json {
        let mut value = json!({ "summary": matched.summary });
        if let Some(path) = output {
            value["output"] = json!(path.display().to_string());
        } else {
            value["rows"] = cardops_io::json::to_records(&matched.table);
        }
        return print_json(&value);
    }

    print!("{}", render_table(&summary_sheet, usize::MAX));
    if !matched.summary.length_distribution.is_empty() {
        println!();
        println!("Phone lengths:");
        for (len, count) in &matched.summary.length_distribution {
            println!("  {len:>2} digits: {count}");
        }
    }
    if output.is_none() {
        println!();
        print!("{}", render_table(&matched.table, PREVIEW_ROWS));
    }
    Ok(())
}

// ============================================================================
// google-ads
// ============================================================================

/// `GoogleAds_<bank>_MIS_<dd-Mon-YYYY>.xlsx`
pub(crate) fn report_file_name(bank: &str, date: NaiveDate) -> String {
    format!("GoogleAds_{}_MIS_{}.xlsx", bank, date.format("%d-%b-%Y"))
}

pub(crate) fn cmd_google_ads(
    ctx: &Context,
    mis: &Source,
    campaign: &Source,
    output: Option<&Path>,
    json: bool,
    email: bool,
) -> Result<(), CliError> {
    let today = Local::now().date_naive();
    let bank = ctx.settings.bank.name.as_str();
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(report_file_name(bank, today)));
    let format = output_format(&path)?;
    if email && !ctx.settings.mail.is_configured() {
        return Err(mail::not_configured());
    }

    let mis = load_mis(ctx, mis)?;
    let campaign = load_campaign(ctx, campaign)?;
    let rules = GoogleAdsRules { utm_sources: ctx.settings.google_ads.utm_sources.clone() };
    let google = filter_google_campaigns(&campaign, &rules)?;
    log::info!("google-ads: {} of {} campaign rows are Google Ads leads", google.len(), campaign.len());

    let result = match_google_ads(&google, &mis)?;
    let pivot = result.pivot.as_ref().filter(|p| !p.is_empty()).map(|p| p.to_table());

    let mut sheets = vec![SheetData::new("Matched Data", &result.matched)];
    if let Some(pivot) = &pivot {
        sheets.push(SheetData::new("Pivot Table", pivot));
    }
    sheets.push(SheetData::new("Campaign Data", &result.campaigns));

    if format == FileFormat::Excel {
        let bytes = xlsx::export_to_buffer(&sheets).map_err(CliError::io)?;
        fs::write(&path, &bytes).map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote report to {}", path.display());
    } else {
        write_output(&path, &sheets)?;
    }

    if email {
        // The attachment is always the workbook, whatever was written locally.
        let bytes = xlsx::export_to_buffer(&sheets).map_err(CliError::io)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|_| format == FileFormat::Excel)
            .unwrap_or_else(|| report_file_name(bank, today));
        let report = mail::Report { bank, date: today, file_name: &file_name, bytes };
        mail::send_report(&ctx.settings.mail, &report)
            .map_err(|e| e.with_hint(format!("the report was saved to {}", path.display())))?;
        eprintln!("emailed report to {}", ctx.settings.mail.to.join(", "));
    }

    if json {
        return print_json(&json!({
            "summary": result.summary,
            "pivot": result.pivot,
            "output": path.display().to_string(),
            "emailed": email,
        }));
    }

    print!("{}", render_table(&google_ads::summary_table(&result.summary), usize::MAX));
    if let Some(pivot) = &pivot {
        println!();
        print!("{}", render_table(pivot, PREVIEW_ROWS));
    }
    Ok(())
}

// ============================================================================
// status
// ============================================================================

pub(crate) struct StatusArgs {
    pub by: FilterBy,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub breakdown: Vec<String>,
    pub top: usize,
}

fn funnel_table(funnel: &[FunnelStage]) -> Table {
    Table::from_rows(
        vec!["Stage".into(), "Count".into(), "Percentage".into()],
        funnel
            .iter()
            .map(|s| {
                vec![
                    Some(s.stage.clone()),
                    Some(s.count.to_string()),
                    Some(format!("{:.1}%", s.percentage)),
                ]
            })
            .collect(),
    )
}

fn breakdown_table(column: &str, values: &[(String, usize)]) -> Table {
    Table::from_rows(
        vec![column.to_string(), "Count".into()],
        values.iter().map(|(v, n)| vec![Some(v.clone()), Some(n.to_string())]).collect(),
    )
}

pub(crate) fn cmd_status(
    ctx: &Context,
    mis: &Source,
    args: StatusArgs,
    output: Option<&Path>,
    json: bool,
) -> Result<(), CliError> {
    if let (Some(from), Some(to)) = (args.from, args.to) {
        if from > to {
            return Err(CliError::usage(format!("--from {from} is after --to {to}")));
        }
    }
    if let Some(path) = output {
        output_format(path)?;
    }

    let mis = load_mis(ctx, mis)?;
    let query = StatusQuery { filter_by: args.by, from: args.from, to: args.to };
    let report = analyze_status(&mis, &query)?;

    let mut breakdowns = Vec::with_capacity(args.breakdown.len());
    for name in &args.breakdown {
        let col = find_optional_col(&report.rows, &[name.as_str()], MatchMode::Exact).ok_or_else(|| {
            ReconError::MissingColumn { dataset: "MIS".to_string(), aliases: vec![name.clone()] }
        })?;
        let column = report.rows.columns[col].clone();
        let values = value_breakdown(&report.rows, col, args.top);
        breakdowns.push((column, values));
    }

    let counts = counts_table(&report.counts);
    let funnel = funnel_table(&report.funnel);

    if let Some(path) = output {
        write_output(
            path,
            &[
                SheetData::new("Filtered Data", &report.rows),
                SheetData::new("Status Summary", &counts),
                SheetData::new("Funnel", &funnel),
            ],
        )?;
    }

    if json {
        let breakdown: serde_json::Map<String, serde_json::Value> = breakdowns
            .iter()
            .map(|(column, values)| {
                let items = values.iter().map(|(v, n)| json!({ "value": v, "count": n })).collect();
                (column.clone(), serde_json::Value::Array(items))
            })
            .collect();
        return print_json(&json!({ "report": report, "breakdown": breakdown }));
    }

    let window_col = match args.by {
        FilterBy::Creation => report.columns.creation.as_deref(),
        FilterBy::Decision => report.columns.decision_date.as_deref(),
        FilterBy::Both => None,
    };
    match window_col {
        Some(col) => println!("Window: {} to {} on {}", report.from, report.to, col),
        None => println!("Window: created from {}, decided by {}", report.from, report.to),
    }
    println!();
    print!("{}", render_table(&counts, usize::MAX));
    println!();
    print!("{}", render_table(&funnel, usize::MAX));
    for (column, values) in &breakdowns {
        println!();
        print!("{}", render_table(&breakdown_table(column, values), usize::MAX));
    }
    Ok(())
}
