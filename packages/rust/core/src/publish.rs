//! Publication of decoded files: one index row and one page per dataset.
//!
//! All index edits happen here, on a single task, against one in-memory copy
//! of the document. Nothing reaches the disk until [`Publication::write`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use csv2md_decoder::DecodedCsv;
use csv2md_markdown::{DatasetPage, MarkdownTable, render_dataset_page};
use csv2md_shared::{AppConfig, Csv2MdError, ErrorPolicy, IndexMapping, Metadata, Result};

use crate::pipeline::{FileOutcome, FileStatus};

/// Counts for one publication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSummary {
    /// Rows appended to the index table.
    pub rows_added: usize,
    /// Dataset pages produced.
    pub pages_written: usize,
    /// Files that could not be read as CSV text at all.
    pub skipped: usize,
    /// Files rejected by decoding, download or publication.
    pub failed: usize,
    /// `(file, error message)` for every failed file.
    pub errors: Vec<(String, String)>,
}

impl PublishSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Everything a run writes, computed in memory.
#[derive(Debug, Clone)]
pub struct Publication {
    /// Index document path.
    pub index_path: PathBuf,
    /// Index document with all new rows applied.
    pub index_document: String,
    /// `(path, markdown)` of each dataset page.
    pub pages: Vec<(PathBuf, String)>,
    pub summary: PublishSummary,
}

impl Publication {
    /// Write the index and the pages.
    ///
    /// Every file is first staged as a temp file beside its target. If any
    /// staging fails the temp files are removed and nothing on disk changes.
    /// Otherwise the index is renamed into place first, then the pages.
    #[instrument(skip_all, fields(index = %self.index_path.display(), pages = self.pages.len()))]
    pub fn write(&self) -> Result<()> {
        if self.summary.rows_added == 0 {
            return Ok(());
        }

        let targets = std::iter::once((&self.index_path, &self.index_document))
            .chain(self.pages.iter().map(|(path, content)| (path, content)));

        let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(self.pages.len() + 1);
        for (path, content) in targets {
            match stage(path, content) {
                Ok(temp) => staged.push((temp, path.as_path())),
                Err(e) => {
                    for (temp, _) in &staged {
                        let _ = std::fs::remove_file(temp);
                    }
                    error!(error = %e, "staging failed, nothing written");
                    return Err(e);
                }
            }
        }

        for (temp, path) in &staged {
            std::fs::rename(temp, path).map_err(|e| Csv2MdError::io(*path, e))?;
            debug!(path = %path.display(), "wrote file");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Apply `outcomes` to the index and write everything.
pub fn publish(
    outcomes: Vec<FileOutcome>,
    config: &AppConfig,
    policy: ErrorPolicy,
) -> Result<PublishSummary> {
    let publication = prepare(outcomes, config, policy)?;
    publication.write()?;
    info!(
        rows_added = publication.summary.rows_added,
        pages = publication.summary.pages_written,
        "publication written"
    );
    Ok(publication.summary)
}

/// Build the publication without touching the disk.
///
/// Under [`ErrorPolicy::Abort`] the first failed file is returned as the
/// error. Under [`ErrorPolicy::Skip`] it is logged and counted.
#[instrument(skip_all, fields(files = outcomes.len(), index = %config.markdown.index.display()))]
pub fn prepare(
    outcomes: Vec<FileOutcome>,
    config: &AppConfig,
    policy: ErrorPolicy,
) -> Result<Publication> {
    let mut summary = PublishSummary::default();
    let mut decoded: Vec<DecodedCsv> = Vec::new();

    for outcome in outcomes {
        let name = outcome.name();
        match outcome.status {
            FileStatus::Decoded(csv) => decoded.push(csv),
            FileStatus::Skipped => summary.skipped += 1,
            FileStatus::Failed(e) => fail(policy, &mut summary, &name, e)?,
        }
    }

    let index_path = config.markdown.index.clone();
    if decoded.is_empty() {
        warn!("no file decoded, index left untouched");
        return Ok(Publication {
            index_path,
            index_document: String::new(),
            pages: Vec::new(),
            summary,
        });
    }

    let mut table = MarkdownTable::from_path(&index_path, config.markdown.table_ordinal)?;
    let mapping = IndexMapping::from(config);
    let generated_at = Utc::now().to_rfc3339();
    let mut stems: HashSet<String> = HashSet::new();
    let mut pages = Vec::with_capacity(decoded.len());

    for csv in &decoded {
        let stem = page_stem(&csv.name);
        if !stems.insert(stem.clone()) {
            let e = Csv2MdError::validation(format!(
                "another file in this run already produces page '{stem}.md'"
            ));
            fail(policy, &mut summary, &csv.name, e)?;
            continue;
        }

        let row = build_index_row(&csv.metadata, &mapping);
        if let Err(e) = table.append_row(&row) {
            fail(policy, &mut summary, &csv.name, e)?;
            continue;
        }
        summary.rows_added += 1;

        let path = config.markdown.pages_dir.join(format!("{stem}.md"));
        debug!(file = %csv.name, page = %path.display(), "rendered page");
        pages.push((path, render_page(csv, config, &stem, &generated_at)));
    }
    summary.pages_written = pages.len();

    Ok(Publication {
        index_path,
        index_document: table.render(),
        pages,
        summary,
    })
}

/// Index row for one dataset: mapped metadata values keyed by table column.
///
/// Metadata keys without a table column are left out.
pub fn build_index_row(metadata: &Metadata, mapping: &IndexMapping) -> BTreeMap<String, String> {
    mapping
        .iter()
        .filter_map(|(column, key)| {
            metadata
                .get(key)
                .map(|value| (column.to_string(), value.clone()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fail(policy: ErrorPolicy, summary: &mut PublishSummary, name: &str, e: Csv2MdError) -> Result<()> {
    if policy == ErrorPolicy::Abort {
        return Err(e);
    }
    error!(file = name, error = %e, "file failed, skipping");
    summary.failed += 1;
    summary.errors.push((name.to_string(), e.to_string()));
    Ok(())
}

fn page_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

fn render_page(csv: &DecodedCsv, config: &AppConfig, stem: &str, generated_at: &str) -> String {
    let title = config
        .markdown
        .title_key
        .as_ref()
        .and_then(|key| csv.metadata.get(key))
        .filter(|title| !title.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| stem.to_string());

    let metadata = config
        .metadata_keys()
        .into_iter()
        .filter_map(|key| {
            let value = csv.metadata.get(&key)?.clone();
            Some((key, value))
        })
        .collect();

    render_dataset_page(&DatasetPage {
        title,
        source_file: csv.name.clone(),
        generated_at: Some(generated_at.to_string()),
        metadata,
        dataset: &csv.dataset,
    })
}

/// Write `content` to a hidden temp file next to `path` and return its path.
fn stage(path: &Path, content: &str) -> Result<PathBuf> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| Csv2MdError::io(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Csv2MdError::validation(format!("not a file path: {}", path.display())))?;
    let temp = dir.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| Csv2MdError::io(&temp, e))?;
    debug!(path = %temp.display(), size = content.len(), "staged file");
    Ok(temp)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
