//! End-to-end runs: CSV files (local or issue attachments) → index rows + pages.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};
use url::Url;

use csv2md_decoder::{DecodedCsv, decode_file};
use csv2md_github::{GithubClient, attachment_name, has_csv_link};
use csv2md_shared::{AppConfig, Csv2MdError, CsvSchema, Result};

use crate::publish::{Publication, PublishSummary, prepare};

/// What happened to one input file during decoding or download.
#[derive(Debug)]
pub enum FileStatus {
    Decoded(DecodedCsv),
    /// The bytes could not be read as delimited text.
    Skipped,
    Failed(Csv2MdError),
}

/// Decode result tagged with the file it belongs to.
#[derive(Debug)]
pub struct FileOutcome {
    /// Local path, or the source URL when the download failed.
    pub path: PathBuf,
    pub status: FileStatus,
}

impl FileOutcome {
    /// File name used in logs and summaries.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed(_))
    }
}

/// Result of a full run.
#[derive(Debug)]
pub struct RunResult {
    pub publication: Publication,
    /// `false` for dry runs.
    pub written: bool,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a file finished decoding.
    fn file_done(&self, name: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &PublishSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_done(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &PublishSummary) {}
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// Decode local CSV files and publish them.
#[instrument(skip_all, fields(files = paths.len(), dry_run = dry_run))]
pub async fn run_local(
    paths: &[PathBuf],
    config: &AppConfig,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    info!(files = paths.len(), "starting local run");

    progress.phase("Decoding CSV files");
    let outcomes = decode_all(
        paths,
        &CsvSchema::from(config),
        config.defaults.concurrency as usize,
        progress,
    )
    .await;

    finish(outcomes, config, dry_run, progress, start)
}

/// Fetch an issue, download its CSV attachments and publish them.
#[instrument(skip_all, fields(repo = %repo, number = number, dry_run = dry_run))]
pub async fn run_issue(
    repo: &str,
    number: u64,
    config: &AppConfig,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let token = std::env::var(&config.github.token_env).ok();
    let client = GithubClient::new(&config.github.api_url, token)?;

    progress.phase("Fetching issue");
    let issue = client.fetch_issue(repo, number).await?;
    if !issue.body.as_deref().is_some_and(has_csv_link) {
        return Err(Csv2MdError::validation(format!(
            "issue #{number} does not link any CSV file"
        )));
    }
    let links = issue.csv_links();
    if links.is_empty() {
        return Err(Csv2MdError::validation(format!(
            "issue #{number} links CSV files, but none over https"
        )));
    }
    info!(links = links.len(), "found CSV attachments");

    run_attachments(&client, &links, config, dry_run, progress).await
}

/// Download the given CSV links and publish them.
#[instrument(skip_all, fields(links = links.len(), dry_run = dry_run))]
pub async fn run_attachments(
    client: &GithubClient,
    links: &[Url],
    config: &AppConfig,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let outcomes = fetch_and_decode(client, links, config, progress).await;
    finish(outcomes, config, dry_run, progress, start)
}

fn finish(
    outcomes: Vec<FileOutcome>,
    config: &AppConfig,
    dry_run: bool,
    progress: &dyn ProgressReporter,
    start: Instant,
) -> Result<RunResult> {
    progress.phase(if dry_run { "Preparing index (dry run)" } else { "Publishing" });
    let publication = prepare(outcomes, config, config.defaults.on_error)?;
    if !dry_run {
        publication.write()?;
    }
    progress.done(&publication.summary);

    let elapsed = start.elapsed();
    info!(
        rows_added = publication.summary.rows_added,
        pages = publication.summary.pages_written,
        skipped = publication.summary.skipped,
        failed = publication.summary.failed,
        dry_run,
        elapsed_ms = elapsed.as_millis() as u64,
        "run complete"
    );

    Ok(RunResult {
        publication,
        written: !dry_run,
        elapsed,
    })
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Decode `paths` on blocking tasks, at most `concurrency` at a time.
///
/// Outcomes come back in input order.
pub async fn decode_files(
    paths: &[PathBuf],
    schema: &CsvSchema,
    concurrency: usize,
) -> Vec<FileOutcome> {
    decode_all(paths, schema, concurrency, &SilentProgress).await
}

/// Download every link into `github.csv_dir`, then decode what arrived.
///
/// One outcome per link, in link order. A failed download becomes a failed
/// outcome named after its URL. Links sharing a file name with an earlier
/// link fail with [`Csv2MdError::Validation`] and are not downloaded.
pub async fn fetch_and_decode(
    client: &GithubClient,
    links: &[Url],
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Vec<FileOutcome> {
    let concurrency = config.defaults.concurrency as usize;

    progress.phase("Downloading attachments");
    let downloads = download_all(client, links, &config.github.csv_dir, concurrency).await;
    let paths: Vec<PathBuf> = downloads
        .iter()
        .filter_map(|d| d.as_ref().ok().cloned())
        .collect();

    progress.phase("Decoding CSV files");
    let mut decoded = decode_all(&paths, &CsvSchema::from(config), concurrency, progress)
        .await
        .into_iter();

    let mut outcomes = Vec::with_capacity(links.len());
    for (url, download) in links.iter().zip(downloads) {
        match download {
            Ok(_) => outcomes.extend(decoded.next()),
            Err(e) => outcomes.push(FileOutcome {
                path: PathBuf::from(url.as_str()),
                status: FileStatus::Failed(e),
            }),
        }
    }
    outcomes
}

async fn decode_all(
    paths: &[PathBuf],
    schema: &CsvSchema,
    concurrency: usize,
    progress: &dyn ProgressReporter,
) -> Vec<FileOutcome> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let schema = Arc::new(schema.clone());

    let handles: Vec<_> = paths
        .iter()
        .cloned()
        .map(|path| {
            let sem = semaphore.clone();
            let schema = schema.clone();
            tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| Csv2MdError::Task(e.to_string()))?;
                tokio::task::spawn_blocking(move || decode_file(&path, &schema))
                    .await
                    .map_err(|e| Csv2MdError::Task(e.to_string()))?
            })
        })
        .collect();

    let total = paths.len();
    let mut outcomes = Vec::with_capacity(total);
    for (i, (path, handle)) in paths.iter().zip(handles).enumerate() {
        let status = match handle.await {
            Ok(Ok(Some(csv))) => FileStatus::Decoded(csv),
            Ok(Ok(None)) => FileStatus::Skipped,
            Ok(Err(e)) => FileStatus::Failed(e),
            Err(e) => FileStatus::Failed(Csv2MdError::Task(e.to_string())),
        };
        let outcome = FileOutcome {
            path: path.clone(),
            status,
        };
        debug!(file = %outcome.name(), failed = outcome.is_failed(), "decode finished");
        progress.file_done(&outcome.name(), i + 1, total);
        outcomes.push(outcome);
    }
    outcomes
}

async fn download_all(
    client: &GithubClient,
    links: &[Url],
    dir: &std::path::Path,
    concurrency: usize,
) -> Vec<Result<PathBuf>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut names = HashSet::new();

    let handles: Vec<_> = links
        .iter()
        .cloned()
        .map(|url| {
            let name = attachment_name(&url).map(str::to_string);
            let taken = name.as_ref().is_some_and(|n| !names.insert(n.clone()));
            let sem = semaphore.clone();
            let client = client.clone();
            let dir = dir.to_path_buf();
            tokio::spawn(async move {
                if taken {
                    return Err(Csv2MdError::validation(format!(
                        "{url}: an earlier attachment is also named '{}'",
                        name.unwrap_or_default()
                    )));
                }
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| Csv2MdError::Task(e.to_string()))?;
                client.download_file(&url, &dir).await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(match handle.await {
            Ok(result) => result,
            Err(e) => Err(Csv2MdError::Task(e.to_string())),
        });
    }
    results
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
