//! Validate command implementation.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use schemata_core::processor::{DocumentOptions, DocumentProcessor, DocumentResult};
use serde::Serialize;
use tracing::{debug, warn};

use super::Session;
use crate::ValidateArgs;

#[derive(Serialize)]
struct DocumentReport {
    path: String,
    #[serde(flatten)]
    result: DocumentResult,
}

pub async fn run(
    config: Option<&Path>,
    root: Option<&Path>,
    args: ValidateArgs,
) -> color_eyre::Result<ExitCode> {
    let session = Session::open(config, root).await?;
    let (full_path, relative) = session.locate(&args.path);

    let documents: Vec<PathBuf> = if full_path.is_dir() {
        session.store.list(&relative).await?
    } else if full_path.is_file() {
        vec![relative]
    } else {
        println!("FAIL not found: {}", full_path.display());
        return Ok(ExitCode::FAILURE);
    };

    let processor = DocumentProcessor::new(&session.registry)
        .with_cache(session.cache.as_ref())
        .with_type_field(&session.config.type_field);
    let options = match args.type_id {
        Some(id) => DocumentOptions::with_type(id),
        None => DocumentOptions::default(),
    };

    let mut reports = Vec::with_capacity(documents.len());
    for path in documents {
        let result = match session.store.read(&path).await {
            Ok(content) => processor.process_document(&content, &path, &options).await,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "document could not be read");
                DocumentResult::unreadable(&path, format!("could not read document: {e}"))
            }
        };
        debug!(path = %path.display(), valid = result.valid, "document processed");
        reports.push(DocumentReport { path: path.display().to_string(), result });
    }

    let invalid = reports.iter().filter(|r| !r.result.valid).count();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_reports(&reports);
    }

    Ok(if invalid == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_reports(reports: &[DocumentReport]) {
    if reports.is_empty() {
        println!("(no documents found)");
        return;
    }

    for report in reports {
        let result = &report.result;
        let typed = match (&result.note_type, &result.type_version) {
            (Some(id), Some(version)) => format!(" ({id} v{version})"),
            (Some(id), None) => format!(" ({id})"),
            _ => String::new(),
        };
        let status = if result.valid { "OK  " } else { "FAIL" };
        println!("{status} {}{typed}", report.path);
        for error in &result.errors {
            println!("  error: {error}");
        }
        for warning in &result.warnings {
            println!("  warning: {warning}");
        }
    }

    let valid = reports.iter().filter(|r| r.result.valid).count();
    println!();
    println!("{valid}/{} documents valid", reports.len());
}
