use anyhow::{bail, Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use imgref_core::config::CONFIG_FILE_NAME;
use imgref_core::oplog::{JsonlAuditLog, JsonlOperationLog};
use imgref_core::rewrite::{FailureReason, FormatConversion};
use imgref_core::vfs::PhysicalFileSystem;
use imgref_core::{normalize_vault_path, BatchSummary, ImgrefConfig, ImgrefEngine, RewriteEdit};

use crate::cli::{Cli, Commands};

/// Run one command against the vault at `cli.root`.
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let config = load_config(&cli.root, cli.config.as_deref())?;
    let engine = build_engine(&cli.root, config, cancel);

    match cli.command {
        Commands::Scan => scan(&engine, cli.json).await,
        Commands::Broken => broken(&engine, cli.json).await,
        Commands::Orphans => orphans(&engine, cli.json).await,
        Commands::Convert {
            policy,
            syntax,
            dry_run,
        } => {
            let mut conversion = FormatConversion::policy(
                policy.unwrap_or(engine.config().rewrite.naming_policy),
            );
            conversion.syntax = syntax;
            convert(&engine, conversion, dry_run, cli.json).await
        }
        Commands::Recover { dry_run } => recover(&engine, dry_run, cli.json).await,
        Commands::Mv { from, to } => move_image(&engine, &cli.root, &from, &to, cli.json).await,
        Commands::Renamed { from, to, dry_run } => {
            engine.record_operation(&from, &to).await?;
            let edits = engine.plan_target_rename(&from, &to).await?;
            apply_or_print(&engine, &edits, dry_run, cli.json).await
        }
        Commands::Config => {
            print!("{}", engine.config().to_yaml()?);
            Ok(())
        }
    }
}

/// Load `explicit`, else `<root>/.imgref.yaml` when present, else defaults.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<ImgrefConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = root.join(CONFIG_FILE_NAME);
            if !default.exists() {
                log::debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, root.display());
                return Ok(ImgrefConfig::default());
            }
            default
        }
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    ImgrefConfig::from_yaml(&content)
        .with_context(|| format!("Invalid config {}", path.display()))
}

pub fn build_engine(root: &Path, config: ImgrefConfig, cancel: CancellationToken) -> ImgrefEngine {
    let store = PhysicalFileSystem::new(root).with_ignore_patterns(&config.scan.ignore_patterns);
    let log = JsonlOperationLog::new(root.join(&config.logs.operation_log));
    let audit = JsonlAuditLog::new(root.join(&config.logs.audit_log));

    ImgrefEngine::new(Arc::new(store), Arc::new(log), config)
        .with_audit_sink(Arc::new(audit))
        .with_cancellation_token(cancel)
}

async fn scan(engine: &ImgrefEngine, as_json: bool) -> Result<()> {
    let snapshot = engine.snapshot().await?;
    let report = &snapshot.report;

    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Documents scanned: {}", report.documents_scanned);
    println!("References:        {}", report.references.len());
    println!("  resolved:        {}", report.resolved().count());
    println!("  broken:          {}", report.broken().count());
    for document in &report.unreadable {
        println!("Unreadable: {}", document);
    }
    if report.cancelled {
        println!("Scan was cancelled; counts are partial.");
    }
    Ok(())
}

async fn broken(engine: &ImgrefEngine, as_json: bool) -> Result<()> {
    let broken = engine.broken_references().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&broken)?);
        return Ok(());
    }

    for reference in &broken {
        let occurrence = &reference.occurrence;
        println!(
            "{}:{}: {}",
            occurrence.document_path, occurrence.line_number, occurrence.raw_text
        );
    }
    println!("{} broken references", broken.len());
    Ok(())
}

async fn orphans(engine: &ImgrefEngine, as_json: bool) -> Result<()> {
    let orphans = engine.orphaned_images().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&orphans)?);
    } else {
        for path in &orphans {
            println!("{}", path);
        }
    }
    Ok(())
}

async fn convert(
    engine: &ImgrefEngine,
    conversion: FormatConversion,
    dry_run: bool,
    as_json: bool,
) -> Result<()> {
    let edits = engine.plan_format_conversion(conversion).await?;
    apply_or_print(engine, &edits, dry_run, as_json).await
}

async fn recover(engine: &ImgrefEngine, dry_run: bool, as_json: bool) -> Result<()> {
    if !dry_run {
        let edits = engine.plan_recovery().await?;
        return apply_or_print(engine, &edits, false, as_json).await;
    }

    let candidates = engine.correlate_broken().await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    for candidate in &candidates {
        let occurrence = &candidate.reference.occurrence;
        match (&candidate.matched_entry, candidate.recovery_type) {
            (Some(entry), Some(recovery_type)) => println!(
                "{}:{}: {} -> {} ({})",
                occurrence.document_path,
                occurrence.line_number,
                occurrence.target_spec,
                entry.new_path,
                recovery_type.as_str()
            ),
            _ => println!(
                "{}:{}: {} (no recovery found)",
                occurrence.document_path, occurrence.line_number, occurrence.target_spec
            ),
        }
    }
    Ok(())
}

async fn move_image(
    engine: &ImgrefEngine,
    root: &Path,
    from: &str,
    to: &str,
    as_json: bool,
) -> Result<()> {
    let from = normalize_vault_path(from);
    let to = normalize_vault_path(to);
    let source: PathBuf = root.join(&from);
    let destination: PathBuf = root.join(&to);

    if !source.is_file() {
        bail!("{} does not exist", source.display());
    }
    if destination.exists() {
        bail!("{} already exists", destination.display());
    }
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::rename(&source, &destination)
        .await
        .with_context(|| format!("Failed to move {} to {}", from, to))?;

    engine.record_operation(&from, &to).await?;
    let edits = engine.plan_target_rename(&from, &to).await?;
    apply_or_print(engine, &edits, false, as_json).await
}

pub(crate) async fn apply_or_print(
    engine: &ImgrefEngine,
    edits: &[RewriteEdit],
    dry_run: bool,
    as_json: bool,
) -> Result<()> {
    if dry_run {
        if as_json {
            println!("{}", serde_json::to_string_pretty(edits)?);
        } else {
            for edit in edits {
                println!(
                    "{}:{}: {} -> {}",
                    edit.document_path, edit.line_number, edit.old_text, edit.new_text
                );
            }
            println!("{} edits planned", edits.len());
        }
        return Ok(());
    }

    let summary = engine.apply(edits).await;
    print_summary(&summary, as_json)?;

    if !summary.is_clean() {
        bail!(
            "{} of {} edits were not applied",
            summary.failed_count + summary.skipped_count,
            edits.len()
        );
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, as_json: bool) -> Result<()> {
    if as_json {
        let value = json!({
            "applied": summary.applied_count,
            "failed": summary.failed_count,
            "skipped": summary.skipped_count,
            "cancelled": summary.cancelled,
            "documentsWritten": summary.documents_written,
            "failures": summary.failures,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "Applied {} edits in {} documents ({} failed, {} skipped)",
        summary.applied_count,
        summary.documents_written.len(),
        summary.failed_count,
        summary.skipped_count
    );
    for failure in &summary.failures {
        let reason = match &failure.reason {
            FailureReason::StaleEdit => "text changed since planning".to_string(),
            FailureReason::LineOutOfRange => "line no longer exists".to_string(),
            FailureReason::Io(message) => message.clone(),
        };
        println!(
            "  {}:{}: {}",
            failure.edit.document_path, failure.edit.line_number, reason
        );
    }
    if summary.cancelled {
        println!("Cancelled; documents already written keep their changes.");
    }
    Ok(())
}
