//! `list import`: load a directory tree into a group.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Args};
use list_common::Config;
use list_core::import::{
    ImportOptions, ImportReport, ImportService, ScanResult, file_type_stats, filter_by_types,
    format_file_size, parse_type_mappings, parse_type_selection, scan_directory,
};
use list_db::repositories::ContentRepository;
use tracing::info;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Arguments of the `import` subcommand.
#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Directory to import
    pub dir: PathBuf,

    /// Owner of the imported content
    #[arg(long, env = "LIST_IMPORT_USER_ID")]
    pub user_id: String,

    /// Target group
    #[arg(long, env = "LIST_IMPORT_GROUP_ID")]
    pub group_id: String,

    /// Extensions to import, e.g. `.md,.txt`, or `all`. Asked for when omitted.
    #[arg(long)]
    pub types: Option<String>,

    /// Content type mappings, e.g. `.md=note,.txt=text`
    #[arg(long = "map")]
    pub map: Option<String>,

    /// Skip files larger than this many megabytes
    #[arg(long, default_value_t = 10)]
    pub max_file_size: u64,

    /// Skip dotfiles and dot-directories
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub skip_hidden: bool,

    /// Scan and report without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

impl ImportArgs {
    const fn max_file_bytes(&self) -> u64 {
        self.max_file_size.saturating_mul(BYTES_PER_MB)
    }
}

fn print_scan_summary(scan: &ScanResult) {
    println!(
        "Found {} directories and {} files",
        scan.dir_count(),
        scan.file_count()
    );
    if scan.skipped_hidden > 0 {
        println!("Skipped {} hidden entries", scan.skipped_hidden);
    }
    for (path, size) in &scan.skipped_large {
        println!("Skipped {path} ({})", format_file_size(*size));
    }

    println!();
    println!("{:<20} {:>8} {:>12}", "TYPE", "FILES", "SIZE");
    for stat in file_type_stats(&scan.entries) {
        println!(
            "{:<20} {:>8} {:>12}",
            stat.extension,
            stat.count,
            format_file_size(stat.total_size)
        );
    }
    println!();
}

fn prompt(question: &str) -> anyhow::Result<String> {
    print!("{question}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_report(report: &ImportReport) {
    println!();
    if report.dry_run {
        println!("Dry run: {} entries would be imported", report.total);
        return;
    }
    println!(
        "Imported {}/{} entries in {:.1}s ({} failed)",
        report.succeeded,
        report.total,
        report.duration.as_secs_f64(),
        report.failed
    );
    for failure in &report.errors {
        println!("  {}: {}", failure.path, failure.message);
    }
}

/// Scan, select, confirm and import.
pub async fn run(config: &Config, args: ImportArgs) -> anyhow::Result<()> {
    let max_file_size = args.max_file_bytes();
    let scan = scan_directory(&args.dir, args.skip_hidden, max_file_size)?;
    print_scan_summary(&scan);

    let stats = file_type_stats(&scan.entries);
    let selection = match &args.types {
        Some(types) => types.clone(),
        None if args.yes => "all".to_string(),
        None => {
            let answer = prompt("Types to import (comma-separated, or 'all') [all]: ")?;
            if answer.is_empty() { "all".to_string() } else { answer }
        }
    };
    let types = parse_type_selection(&selection, &stats);
    let type_mappings = args
        .map
        .as_deref()
        .map(parse_type_mappings)
        .transpose()?
        .unwrap_or_default();

    let entries = filter_by_types(scan.entries, &types);
    if entries.is_empty() {
        println!("Nothing to import");
        return Ok(());
    }

    if !args.yes && !args.dry_run {
        let answer = prompt(&format!(
            "Import {} entries into group {}? [y/N]: ",
            entries.len(),
            args.group_id
        ))?;
        if !matches!(answer.to_lowercase().as_str(), "y" | "yes") {
            println!("Aborted");
            return Ok(());
        }
    }

    let options = ImportOptions {
        user_id: args.user_id,
        group_id: args.group_id,
        type_mappings,
        max_file_size,
        dry_run: args.dry_run,
    };

    let report = if options.dry_run {
        ImportReport {
            total: entries.len(),
            dry_run: true,
            ..ImportReport::default()
        }
    } else {
        let db = Arc::new(list_db::init(config).await?);
        let service = ImportService::new(ContentRepository::new(db));
        info!(dir = %args.dir.display(), group_id = %options.group_id, "Starting import");
        service.run(&options, entries).await?
    };

    print_report(&report);
    Ok(())
}
