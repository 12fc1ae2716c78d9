//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use csv2md_core::pipeline::{ProgressReporter, RunResult};
use csv2md_core::publish::PublishSummary;
use csv2md_shared::{AppConfig, CsvSchema, config_file_path, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// csv2md: turn dataset CSVs into Markdown index rows and pages.
#[derive(Parser)]
#[command(
    name = "csv2md",
    version,
    about = "Publish semicolon-delimited dataset CSVs to a Markdown index and per-dataset pages.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./csv2md.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Publish local CSV files.
    Process {
        /// CSV files to publish.
        files: Vec<PathBuf>,

        /// Also publish every *.csv file in this directory.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print the updated index instead of writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Publish the CSV attachments linked from a GitHub issue.
    Issue {
        /// Repository as owner/name.
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repo: String,

        /// Issue number.
        #[arg(long, env = "ISSUE_NUMBER")]
        number: u64,

        /// Print the updated index instead of writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Decode one CSV and print its metadata and dataset.
    Inspect {
        /// CSV file to decode.
        file: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Crates whose events are shown by default.
const LOG_TARGETS: &[&str] = &[
    "csv2md",
    "csv2md_core",
    "csv2md_decoder",
    "csv2md_markdown",
    "csv2md_github",
    "csv2md_shared",
];

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Process {
            files,
            dir,
            dry_run,
        } => cmd_process(config_path.as_deref(), files, dir.as_deref(), dry_run).await,
        Command::Issue {
            repo,
            number,
            dry_run,
        } => cmd_issue(config_path.as_deref(), &repo, number, dry_run).await,
        Command::Inspect { file } => cmd_inspect(config_path.as_deref(), &file).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path.as_deref()).await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_process(
    config_path: Option<&Path>,
    mut files: Vec<PathBuf>,
    dir: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let config = resolve_config(config_path)?;

    if let Some(dir) = dir {
        files.extend(csv_files_in(dir)?);
    }
    if files.is_empty() {
        return Err(eyre!("no CSV files given: pass file paths or --dir"));
    }

    info!(files = files.len(), dry_run, "processing local files");

    let reporter = CliProgress::new();
    let result = csv2md_core::pipeline::run_local(&files, &config, dry_run, &reporter).await?;
    report(&result)
}

async fn cmd_issue(config_path: Option<&Path>, repo: &str, number: u64, dry_run: bool) -> Result<()> {
    let config = resolve_config(config_path)?;

    info!(repo, number, dry_run, "processing issue attachments");

    let reporter = CliProgress::new();
    let result =
        csv2md_core::pipeline::run_issue(repo, number, &config, dry_run, &reporter).await?;
    report(&result)
}

async fn cmd_inspect(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    let schema = CsvSchema::from(&config);

    let Some(decoded) = csv2md_decoder::decode_file(file, &schema)? else {
        return Err(eyre!(
            "{} could not be read as delimited text",
            file.display()
        ));
    };

    let metadata_rows: Vec<Vec<String>> = config
        .metadata_keys()
        .into_iter()
        .filter_map(|key| {
            let value = decoded.metadata.get(&key)?.clone();
            Some(vec![key, value])
        })
        .collect();
    let metadata_columns = vec!["Key".to_string(), "Value".to_string()];

    println!("File:     {}", decoded.name);
    println!("Encoding: {}", decoded.encoding);
    println!("Records:  {}", decoded.dataset.len());
    println!();
    print!("{}", csv2md_markdown::render_table(&metadata_columns, &metadata_rows));
    println!();
    print!(
        "{}",
        csv2md_markdown::render_table(&decoded.dataset.columns, &decoded.dataset.rows)
    );

    Ok(())
}

async fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = config_path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    let path = init_config(&path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Print the run summary. Fails when any file failed, so the exit code is non-zero.
fn report(result: &RunResult) -> Result<()> {
    let publication = &result.publication;
    let summary = &publication.summary;

    if result.written {
        println!();
        println!("  Index:   {}", publication.index_path.display());
        println!("  Rows:    {}", summary.rows_added);
        println!("  Pages:   {}", summary.pages_written);
        for (path, _) in &publication.pages {
            println!("           {}", path.display());
        }
    } else {
        print!("{}", publication.index_document);
        println!();
        println!("  Dry run: {} row(s), {} page(s) not written", summary.rows_added, summary.pages_written);
    }
    println!("  Skipped: {}", summary.skipped);
    println!("  Failed:  {}", summary.failed);
    for (file, error) in &summary.errors {
        println!("           {file}: {error}");
    }
    println!("  Time:    {:.1}s", result.elapsed.as_secs_f64());
    println!();

    if summary.has_failures() {
        return Err(eyre!("{} file(s) failed", summary.failed));
    }
    Ok(())
}

/// `*.csv` files directly inside `dir`, sorted by name.
fn csv_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| eyre!("cannot read directory '{}': {e}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_done(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Decoded [{current}/{total}] {name}"));
    }

    fn done(&self, _summary: &PublishSummary) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
