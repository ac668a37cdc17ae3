//! Directory import.
//!
//! Walks a directory tree and recreates it as content: one `folder` item
//! per directory and one item per file, nested the same way.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use list_common::{AppError, AppResult};
use list_db::repositories::{ContentRepository, NewContent};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Label used for files without an extension.
pub const NO_EXTENSION: &str = "(no extension)";

/// Value of `metadata.import_source` on imported items.
pub const IMPORT_SOURCE: &str = "cli_import";

/// A file or directory found by [`scan_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub path: PathBuf,
    /// Path relative to the scan root, `/`-separated.
    pub relative_path: String,
    pub size: u64,
    /// Lowercased extension with its dot, or empty.
    pub extension: String,
    pub modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

impl ScanEntry {
    /// Number of path separators in the relative path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.relative_path.matches('/').count()
    }

    /// Relative path of the containing directory, `None` at the top level.
    #[must_use]
    pub fn parent_path(&self) -> Option<&str> {
        self.relative_path.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Last path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map_or(self.relative_path.as_str(), |(_, name)| name)
    }

    fn extension_label(&self) -> &str {
        if self.extension.is_empty() {
            NO_EXTENSION
        } else {
            &self.extension
        }
    }
}

/// Result of a directory scan.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub entries: Vec<ScanEntry>,
    /// Relative paths and sizes of files over the size limit.
    pub skipped_large: Vec<(String, u64)>,
    pub skipped_hidden: usize,
}

impl ScanResult {
    /// Number of directories found.
    #[must_use]
    pub fn dir_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_dir).count()
    }

    /// Number of files found.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.entries.len() - self.dir_count()
    }
}

/// Count and size of files sharing an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTypeStats {
    pub extension: String,
    pub count: usize,
    pub total_size: u64,
}

/// Walk `root` recursively.
///
/// Hidden entries (leading `.`) are skipped when `skip_hidden` is set, and
/// hidden directories are not descended into. Files larger than
/// `max_file_size` bytes are left out and reported. Symlinks are ignored.
pub fn scan_directory(root: &Path, skip_hidden: bool, max_file_size: u64) -> AppResult<ScanResult> {
    if !root.is_dir() {
        return Err(AppError::BadRequest(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let mut result = ScanResult::default();
    walk(root, root, skip_hidden, max_file_size, &mut result)?;
    Ok(result)
}

fn walk(
    root: &Path,
    dir: &Path,
    skip_hidden: bool,
    max_file_size: u64,
    result: &mut ScanResult,
) -> AppResult<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| AppError::Internal(format!("Failed to read {}: {e}", dir.display())))?
        .collect::<Result<_, _>>()
        .map_err(|e| AppError::Internal(format!("Failed to read entry: {e}")))?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if skip_hidden && name.starts_with('.') {
            result.skipped_hidden += 1;
            continue;
        }

        let file_type = entry
            .file_type()
            .map_err(|e| AppError::Internal(format!("Failed to stat {}: {e}", path.display())))?;
        if file_type.is_symlink() {
            debug!(path = %path.display(), "Skipping symlink");
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| AppError::Internal(format!("Failed to stat {}: {e}", path.display())))?;
        let relative_path = relative_path(root, &path);

        if !file_type.is_dir() && metadata.len() > max_file_size {
            result.skipped_large.push((relative_path, metadata.len()));
            continue;
        }

        let extension = if file_type.is_dir() {
            String::new()
        } else {
            path.extension()
                .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
                .unwrap_or_default()
        };

        result.entries.push(ScanEntry {
            path: path.clone(),
            relative_path,
            size: metadata.len(),
            extension,
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            is_dir: file_type.is_dir(),
        });

        if file_type.is_dir() {
            walk(root, &path, skip_hidden, max_file_size, result)?;
        }
    }

    Ok(())
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Per-extension statistics, most common first.
#[must_use]
pub fn file_type_stats(entries: &[ScanEntry]) -> Vec<FileTypeStats> {
    let mut by_ext: HashMap<&str, FileTypeStats> = HashMap::new();
    for entry in entries.iter().filter(|e| !e.is_dir) {
        let label = entry.extension_label();
        let stats = by_ext.entry(label).or_insert_with(|| FileTypeStats {
            extension: label.to_string(),
            count: 0,
            total_size: 0,
        });
        stats.count += 1;
        stats.total_size += entry.size;
    }

    let mut stats: Vec<_> = by_ext.into_values().collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.extension.cmp(&b.extension)));
    stats
}

/// Normalize a user-typed extension: `md` and `.MD` both become `.md`.
#[must_use]
pub fn normalize_type(value: &str) -> String {
    let value = value.trim();
    if value == NO_EXTENSION {
        return value.to_string();
    }
    let lower = value.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

/// Parse a comma-separated type list; `all` selects every type in `stats`.
#[must_use]
pub fn parse_type_selection(input: &str, stats: &[FileTypeStats]) -> Vec<String> {
    if input.trim().eq_ignore_ascii_case("all") {
        return stats.iter().map(|s| s.extension.clone()).collect();
    }
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(normalize_type)
        .collect()
}

/// Keep directories and files whose extension is selected.
#[must_use]
pub fn filter_by_types(entries: Vec<ScanEntry>, types: &[String]) -> Vec<ScanEntry> {
    entries
        .into_iter()
        .filter(|e| e.is_dir || types.iter().any(|t| t == e.extension_label()))
        .collect()
}

/// Content type for a file extension when the user gives no mapping.
#[must_use]
pub fn default_content_type(extension: &str) -> &'static str {
    match extension {
        ".jpg" | ".jpeg" | ".png" | ".gif" | ".webp" | ".svg" | ".bmp" | ".ico" => "image",
        ".mp4" | ".mov" | ".avi" | ".mkv" | ".webm" | ".flv" | ".wmv" => "video",
        ".mp3" | ".wav" | ".m4a" | ".flac" | ".ogg" | ".aac" => "audio",
        ".pdf" | ".doc" | ".docx" | ".xls" | ".xlsx" | ".ppt" | ".pptx" => "document",
        ".zip" | ".tar" | ".gz" | ".bz2" | ".7z" | ".rar" => "archive",
        _ => "text",
    }
}

/// Parse `ext=type` pairs such as `.md=note,txt=text`.
pub fn parse_type_mappings(input: &str) -> AppResult<HashMap<String, String>> {
    let mut mappings = HashMap::new();
    for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (ext, content_type) = pair
            .split_once('=')
            .ok_or_else(|| AppError::BadRequest(format!("Invalid mapping: {pair}")))?;
        let content_type = content_type.trim();
        if content_type.is_empty() {
            return Err(AppError::BadRequest(format!("Invalid mapping: {pair}")));
        }
        mappings.insert(normalize_type(ext), content_type.to_string());
    }
    Ok(mappings)
}

/// Order entries so every directory comes before its contents: shallow
/// first, then directories before files, then by path.
pub fn sort_for_import(entries: &mut [ScanEntry]) {
    entries.sort_by(|a, b| {
        a.depth()
            .cmp(&b.depth())
            .then_with(|| b.is_dir.cmp(&a.is_dir))
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });
}

/// Human-readable size, e.g. `1.5 MB`.
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let unit = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {unit}B", bytes as f64 / div as f64)
}

/// Options for [`ImportService::run`].
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub user_id: String,
    pub group_id: String,
    /// Extension to content type; unmapped extensions use
    /// [`default_content_type`].
    pub type_mappings: HashMap<String, String>,
    pub max_file_size: u64,
    pub dry_run: bool,
}

impl ImportOptions {
    fn content_type_for(&self, extension: &str) -> String {
        self.type_mappings
            .get(extension)
            .cloned()
            .unwrap_or_else(|| default_content_type(extension).to_string())
    }
}

/// A per-entry failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub path: String,
    pub message: String,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<ImportFailure>,
    pub duration: Duration,
    pub dry_run: bool,
}

/// Creates content from scanned entries.
#[derive(Clone)]
pub struct ImportService {
    content_repo: ContentRepository,
}

impl ImportService {
    /// Create a new import service.
    #[must_use]
    pub const fn new(content_repo: ContentRepository) -> Self {
        Self { content_repo }
    }

    /// Import `entries`. Per-entry failures are collected and the run goes on.
    ///
    /// A file whose folder failed to import lands at the top level.
    pub async fn run(
        &self,
        options: &ImportOptions,
        mut entries: Vec<ScanEntry>,
    ) -> AppResult<ImportReport> {
        let start = Instant::now();
        sort_for_import(&mut entries);

        let mut report = ImportReport {
            total: entries.len(),
            dry_run: options.dry_run,
            ..ImportReport::default()
        };

        if options.dry_run {
            info!(total = report.total, "Dry run, nothing imported");
            report.duration = start.elapsed();
            return Ok(report);
        }

        let mut folders: HashMap<String, String> = HashMap::new();

        for (index, entry) in entries.iter().enumerate() {
            debug!(n = index + 1, total = report.total, path = %entry.relative_path, "Importing");

            let parent_id = entry
                .parent_path()
                .and_then(|parent| folders.get(parent))
                .cloned();

            match self.import_entry(options, entry, parent_id).await {
                Ok(id) => {
                    if entry.is_dir {
                        folders.insert(entry.relative_path.clone(), id);
                    }
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!(path = %entry.relative_path, error = %e, "Import failed");
                    report.failed += 1;
                    report.errors.push(ImportFailure {
                        path: entry.relative_path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report.duration = start.elapsed();
        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration.as_millis() as u64,
            "Import finished"
        );
        Ok(report)
    }

    async fn import_entry(
        &self,
        options: &ImportOptions,
        entry: &ScanEntry,
        parent_id: Option<String>,
    ) -> AppResult<String> {
        let modified = entry.modified.map(|t| t.to_rfc3339());

        let input = if entry.is_dir {
            NewContent {
                content_type: "folder".to_string(),
                data: entry.file_name().to_string(),
                metadata: Some(json!({
                    "original_path": entry.relative_path,
                    "created_at": modified,
                    "import_source": IMPORT_SOURCE,
                })),
                ..NewContent::default()
            }
        } else {
            let data = read_file(&entry.path, options.max_file_size).await?;
            NewContent {
                content_type: options.content_type_for(&entry.extension),
                data,
                metadata: Some(json!({
                    "original_path": entry.relative_path,
                    "file_name": entry.file_name(),
                    "file_size": entry.size,
                    "file_ext": entry.extension,
                    "modified_at": modified,
                    "import_source": IMPORT_SOURCE,
                })),
                ..NewContent::default()
            }
        };

        let created = self
            .content_repo
            .create_content(NewContent {
                group_id: options.group_id.clone(),
                user_id: options.user_id.clone(),
                parent_content_id: parent_id,
                ..input
            })
            .await?;

        Ok(created.id)
    }
}

async fn read_file(path: &Path, max_size: u64) -> AppResult<String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to stat {}: {e}", path.display())))?;
    if max_size > 0 && metadata.len() > max_size {
        return Err(AppError::Validation(format!(
            "File too large: {} bytes (max: {max_size} bytes)",
            metadata.len()
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read {}: {e}", path.display())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
