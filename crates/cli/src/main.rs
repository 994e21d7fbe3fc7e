// cardops CLI - campaign and MIS reconciliation, headless

mod exit_codes;
mod mail;
mod reports;
mod setup;
mod sql;
mod upload;
mod util;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use cardops_config::Settings;
use cardops_recon::dates::parse_date;
use cardops_recon::status::FilterBy;
use cardops_recon::ReconError;
use cardops_store::{Store, StoreError, TableNames};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{
    recon_exit_code, store_exit_code, EXIT_ERROR, EXIT_IO, EXIT_MAIL, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "cardops")]
#[command(about = "Campaign and MIS reconciliation for card-sourcing operations")]
#[command(version)]
#[command(long_version = long_version())]
struct Cli {
    /// Settings file [default: <config dir>/cardops/settings.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Database file (overrides settings and CARDOPS_DB)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Log more (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive phone numbers from LC2 codes
    #[command(after_help = "\
Examples:
  cardops derive IVZZ MNOPQRSTUV
  cardops derive CGMNOPQRSTU --json

Codes that decode to nothing print '-' (exit 0).")]
    Derive {
        /// One or more LC2 codes
        #[arg(required = true)]
        codes: Vec<String>,

        /// Output as JSON array
        #[arg(long)]
        json: bool,
    },

    /// Load and inspect the MIS table
    #[command(subcommand)]
    Mis(MisCommands),

    /// Load campaign lead data
    #[command(subcommand)]
    Campaign(CampaignCommands),

    /// Attach phone numbers to MIS rows from LC2 codes and campaign data
    #[command(after_help = "\
Sources are a file path (.xlsx, .csv) or the word 'db'.

Examples:
  cardops phones --mis MIS.xlsx --campaign campaign.csv -o phones.xlsx
  cardops phones --mis db --campaign db --json

Excel output has sheets 'Phone Numbers' and 'Processing Summary'.
CSV and JSON output hold the matched rows only.")]
    Phones {
        /// MIS extract, or 'db'
        #[arg(long, value_name = "FILE|db")]
        mis: Source,

        /// Campaign extract, or 'db'
        #[arg(long, value_name = "FILE|db")]
        campaign: Source,

        /// Write matched rows (.xlsx, .csv, .tsv, .json)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Match Google Ads campaign leads against the MIS and build the report
    #[command(after_help = "\
Examples:
  cardops google-ads --mis MIS.xlsx
  cardops google-ads --mis db --campaign leads.csv -o report.xlsx --email

Without -o the report is written to GoogleAds_<bank>_MIS_<dd-Mon-YYYY>.xlsx.
Sheets: 'Matched Data', 'Pivot Table' (when non-empty), 'Campaign Data'.
CSV, TSV and JSON output hold the matched rows only.
--email sends the report to the recipients in [mail]; the SMTP password is
read from CARDOPS_SMTP_PASSWORD.")]
    GoogleAds {
        /// MIS extract, or 'db'
        #[arg(long, value_name = "FILE|db")]
        mis: Source,

        /// Campaign extract, or 'db'
        #[arg(long, value_name = "FILE|db", default_value = "db")]
        campaign: Source,

        /// Report path (.xlsx, or .csv/.tsv/.json for the matched rows)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Email the report after writing it
        #[arg(long)]
        email: bool,
    },

    /// Application status counts and funnel over a date window
    #[command(after_help = "\
Examples:
  cardops status --mis db
  cardops status --mis MIS.xlsx --by decision --from 01/03/2024 --to 31/03/2024
  cardops status --mis db --breakdown LG_CODE --breakdown FINAL_DECISION -o status.xlsx

Dates are day-first. Both ends are inclusive; default is the full range of
valid dates in the data. --by both keeps rows created on/after --from and
decided on/before --to; dates before 2000 never count.")]
    Status {
        /// MIS extract, or 'db'
        #[arg(long, value_name = "FILE|db")]
        mis: Source,

        /// Date column the window applies to: creation, decision, both
        #[arg(long, default_value = "creation", value_parser = FilterBy::from_str)]
        by: FilterBy,

        /// Window start (inclusive)
        #[arg(long, value_parser = parse_day)]
        from: Option<NaiveDate>,

        /// Window end (inclusive)
        #[arg(long, value_parser = parse_day)]
        to: Option<NaiveDate>,

        /// Count rows per value of this column (repeatable)
        #[arg(long, value_name = "COLUMN")]
        breakdown: Vec<String>,

        /// Values shown per breakdown
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write filtered rows with mapped_status (.xlsx, .csv, .tsv, .json)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read-only SQL console over the database
    #[command(subcommand)]
    Sql(SqlCommands),

    /// Settings file
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Report mail credentials
    #[command(subcommand)]
    Mail(MailCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a settings file with every default spelled out
    #[command(after_help = "\
Examples:
  cardops config init
  cardops --config ./settings.toml config init --force

Writes to --config when given, else <config dir>/cardops/settings.toml.")]
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum MailCommands {
    /// Store the SMTP password for mail.username in the system keychain
    #[command(after_help = "\
The password is read from stdin (one line), e.g.
  printf '%s\\n' \"$PASS\" | cardops mail set-password

Needs a build with the 'keychain' feature. Otherwise set CARDOPS_SMTP_PASSWORD.")]
    SetPassword,
}

#[derive(Subcommand)]
enum MisCommands {
    /// Upsert (or replace) the MIS table from an .xlsx or .csv extract
    #[command(after_help = "\
Examples:
  cardops mis upload MIS_2024-03-05.xlsx
  cardops mis upload full_extract.csv --replace --actor ops

Rows are keyed by APPLICATION_REFERENCE_NUMBER; the last row of a duplicated
id wins. Columns the existing table does not have are ignored.")]
    Upload {
        file: PathBuf,

        /// Drop the table and load the file as its only content
        #[arg(long)]
        replace: bool,

        /// Name recorded in the update log
        #[arg(long, default_value = "cardops")]
        actor: String,

        /// Print the upload report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Row count and last update time of the MIS table
    Info {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CampaignCommands {
    /// Replace the campaign table with an .xlsx or .csv extract
    #[command(after_help = "\
Examples:
  cardops campaign load leads_2024-03-05.csv

The extract needs a seqId column. Google Ads reports read rows whose
storeSlug contains bank.store_filter.")]
    Load {
        file: PathBuf,

        /// Name recorded in the update log
        #[arg(long, default_value = "cardops")]
        actor: String,
    },
}

#[derive(Subcommand)]
enum SqlCommands {
    /// Run a read-only query
    #[command(after_help = "\
Examples:
  cardops sql query \"SELECT FINAL_DECISION, COUNT(*) FROM HDFC_MIS_Data GROUP BY 1\"
  cardops sql query \"SELECT * FROM Campaign_Data\" -o campaign.xlsx

Queries containing DROP, DELETE, TRUNCATE, UPDATE, INSERT, ALTER, CREATE,
GRANT or REVOKE anywhere in the text are refused (exit 5).")]
    Query {
        sql: String,

        /// Write results (.xlsx, .csv, .tsv, .json)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Print results as JSON records
        #[arg(long)]
        json: bool,
    },

    /// List tables
    Tables {
        #[arg(long)]
        json: bool,
    },

    /// List a table's columns and declared types
    Columns {
        table: String,

        #[arg(long)]
        json: bool,
    },

    /// Print starter queries for the configured tables
    Examples,
}

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Db,
    File(PathBuf),
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("empty source".to_string()),
            s if s.eq_ignore_ascii_case("db") => Ok(Source::Db),
            s => Ok(Source::File(PathBuf::from(s))),
        }
    }
}

const fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("'{s}' is not a date (try DD/MM/YYYY or YYYY-MM-DD)"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Config(ConfigCommands::Init { force }) = cli.command {
        return finish(setup::cmd_config_init(cli.config.as_deref(), force));
    }

    let result = Context::load(cli.config.as_deref(), cli.db).and_then(|ctx| match cli.command {
        Commands::Derive { codes, json } => reports::cmd_derive(&codes, json),
        Commands::Mis(MisCommands::Upload { file, replace, actor, json }) => {
            upload::cmd_mis_upload(&ctx, &file, replace, &actor, json)
        }
        Commands::Mis(MisCommands::Info { json }) => upload::cmd_mis_info(&ctx, json),
        Commands::Campaign(CampaignCommands::Load { file, actor }) => {
            upload::cmd_campaign_load(&ctx, &file, &actor)
        }
        Commands::Phones { mis, campaign, output, json } => {
            reports::cmd_phones(&ctx, &mis, &campaign, output.as_deref(), json)
        }
        Commands::GoogleAds { mis, campaign, output, json, email } => {
            reports::cmd_google_ads(&ctx, &mis, &campaign, output.as_deref(), json, email)
        }
        Commands::Status { mis, by, from, to, breakdown, top, output, json } => reports::cmd_status(
            &ctx,
            &mis,
            reports::StatusArgs { by, from, to, breakdown, top },
            output.as_deref(),
            json,
        ),
        Commands::Sql(SqlCommands::Query { sql, output, json }) => {
            sql::cmd_query(&ctx, &sql, output.as_deref(), json)
        }
        Commands::Sql(SqlCommands::Tables { json }) => sql::cmd_tables(&ctx, json),
        Commands::Sql(SqlCommands::Columns { table, json }) => sql::cmd_columns(&ctx, &table, json),
        Commands::Sql(SqlCommands::Examples) => sql::cmd_examples(&ctx),
        Commands::Mail(MailCommands::SetPassword) => setup::cmd_mail_set_password(&ctx),
        Commands::Config(ConfigCommands::Init { .. }) => Ok(()),
    });
    finish(result)
}

fn finish(result: Result<(), CliError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Settings and database location for one invocation.
pub struct Context {
    pub settings: Settings,
    pub db_path: PathBuf,
}

impl Context {
    fn load(config: Option<&Path>, db: Option<PathBuf>) -> Result<Self, CliError> {
        let settings = match config {
            Some(path) if !path.exists() => {
                return Err(CliError::usage(format!("settings file not found: {}", path.display())))
            }
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        }
        .map_err(CliError::usage)?;
        let db_path = db.unwrap_or_else(|| settings.db_path());
        log::debug!("database: {}", db_path.display());
        Ok(Self { settings, db_path })
    }

    pub fn open_store(&self) -> Result<Store, CliError> {
        let tables = TableNames {
            mis: self.settings.tables.mis.clone(),
            campaign: self.settings.tables.campaign.clone(),
            update_log: self.settings.tables.update_log.clone(),
        };
        Ok(Store::open(&self.db_path, tables)?)
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn mail(msg: impl Into<String>) -> Self {
        Self { code: EXIT_MAIL, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::MissingColumn { .. } => Some("check the header row of the input file"),
            ReconError::ManyToOneViolation { .. } => {
                Some("the campaign data has more than one gclid for a seqId; deduplicate it first")
            }
            ReconError::NoRecordsInRange { .. } => Some("widen --from/--to or use a different --by"),
            ReconError::NoDateColumns { .. } | ReconError::NoValidDates { .. } => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint: hint.map(String::from) }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        let hint = match &err {
            StoreError::UnsafeQuery { .. } | StoreError::WriteStatement => {
                Some("only read-only SELECT queries can be run")
            }
            StoreError::NoRows => Some("the file has a header but no rows with an application id"),
            StoreError::NoCommonColumns { .. } => Some("use --replace to load a file with a new layout"),
            _ => None,
        };
        Self { code: store_exit_code(&err), message: err.to_string(), hint: hint.map(String::from) }
    }
}
