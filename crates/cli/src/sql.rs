// Read-only SQL console: query, tables, columns, examples

use std::path::Path;

use cardops_io::xlsx::SheetData;
use cardops_recon::Table;
use serde_json::json;

use crate::reports::{output_format, write_output};
use crate::util::render_table;
use crate::{CliError, Context};

/// Rows printed to the terminal; use -o for the full result.
const MAX_PRINTED_ROWS: usize = 100;

/// Starter queries, with the configured MIS and campaign table names.
pub(crate) fn example_queries(mis: &str, campaign: &str) -> Vec<(&'static str, String)> {
    vec![
        ("First rows", format!("SELECT * FROM \"{mis}\" LIMIT 10")),
        ("Total count", format!("SELECT COUNT(*) AS total FROM \"{mis}\"")),
        (
            "Decisions",
            format!(
                "SELECT \"FINAL_DECISION\", COUNT(*) AS count FROM \"{mis}\" \
                 GROUP BY \"FINAL_DECISION\" ORDER BY count DESC"
            ),
        ),
        ("IPA approved", format!("SELECT * FROM \"{mis}\" WHERE \"IPA_STATUS\" = 'APPROVE' LIMIT 100")),
        (
            "Decided in the last 30 days",
            format!(
                "SELECT * FROM \"{mis}\" WHERE \"FINAL_DECISION_DATE\" >= date('now', '-30 days') \
                 ORDER BY \"FINAL_DECISION_DATE\" DESC LIMIT 100"
            ),
        ),
        (
            "MIS with campaign",
            format!(
                "SELECT m.*, c.\"seqId\" FROM \"{mis}\" m \
                 LEFT JOIN \"{campaign}\" c ON m.\"LC2_CODE\" = 'CG' || c.\"seqId\" LIMIT 100"
            ),
        ),
    ]
}

pub(crate) fn cmd_query(ctx: &Context, sql: &str, output: Option<&Path>, json: bool) -> Result<(), CliError> {
    if sql.trim().is_empty() {
        return Err(CliError::usage("empty query"));
    }
    cardops_store::is_safe_query(sql)?;
    if let Some(path) = output {
        output_format(path)?;
    }

    let store = ctx.open_store()?;
    let table = store.execute_query(sql)?;

    if let Some(path) = output {
        write_output(path, &[SheetData::new("Query Results", &table)])?;
    }
    if json {
        let text = cardops_io::json::to_string(&table).map_err(CliError::general)?;
        println!("{text}");
    } else if output.is_none() {
        print_rows(&table);
    }
    Ok(())
}

fn print_rows(table: &Table) {
    print!("{}", render_table(table, MAX_PRINTED_ROWS));
    println!("({} rows)", table.len());
}

pub(crate) fn cmd_tables(ctx: &Context, json: bool) -> Result<(), CliError> {
    let tables = ctx.open_store()?.list_tables()?;
    if json {
        println!("{}", json!(tables));
    } else {
        for name in tables {
            println!("{name}");
        }
    }
    Ok(())
}

pub(crate) fn cmd_columns(ctx: &Context, table: &str, json: bool) -> Result<(), CliError> {
    let columns = ctx.open_store()?.list_columns(table)?;
    if json {
        let items: Vec<_> = columns.iter().map(|c| json!({ "name": c.name, "type": c.data_type })).collect();
        println!("{}", serde_json::Value::Array(items));
        return Ok(());
    }
    let listing = Table::from_rows(
        vec!["Column".into(), "Type".into()],
        columns
            .into_iter()
            .map(|c| vec![Some(c.name), Some(c.data_type).filter(|t| !t.is_empty())])
            .collect(),
    );
    print!("{}", render_table(&listing, usize::MAX));
    Ok(())
}

pub(crate) fn cmd_examples(ctx: &Context) -> Result<(), CliError> {
    let tables = &ctx.settings.tables;
    for (title, sql) in example_queries(&tables.mis, &tables.campaign) {
        println!("-- {title}");
        println!("{sql};");
        println!();
    }
    Ok(())
}
