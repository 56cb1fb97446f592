use std::path::Path;
use std::process::ExitCode;

use schemata_core::header::extract_header;
use schemata_core::processor::DocumentProcessor;

use super::Session;

pub async fn run(
    config: Option<&Path>,
    root: Option<&Path>,
    path: &Path,
) -> color_eyre::Result<ExitCode> {
    let session = Session::open(config, root).await?;
    let (full_path, relative) = session.locate(path);

    if !full_path.is_file() {
        println!("FAIL not found: {}", full_path.display());
        return Ok(ExitCode::FAILURE);
    }

    let content = session.store.read(&relative).await?;
    let header = match extract_header(&content) {
        Ok(extracted) => extracted.header,
        Err(e) => {
            println!("FAIL {}: {e}", relative.display());
            return Ok(ExitCode::FAILURE);
        }
    };

    let processor = DocumentProcessor::new(&session.registry)
        .with_cache(session.cache.as_ref())
        .with_type_field(&session.config.type_field);
    let detection = processor.detect_type(&header, &relative);

    for warning in &detection.warnings {
        println!("warning: {warning}");
    }
    let Some(note_type) = detection.note_type else {
        println!("no note type detected for {}", relative.display());
        return Ok(ExitCode::FAILURE);
    };

    println!("type: {}", note_type.id);
    println!("version: {}", note_type.version);
    println!("confidence: {}", detection.confidence);
    println!("method: {}", detection.method);
    Ok(ExitCode::SUCCESS)
}
