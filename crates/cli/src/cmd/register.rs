use std::fs;
use std::path::Path;
use std::process::ExitCode;

use color_eyre::eyre::WrapErr;
use schemata_core::types::{NoteType, RegisterOptions};
use tracing::info;

use super::Session;
use crate::RegisterArgs;

pub async fn run(
    config: Option<&Path>,
    root: Option<&Path>,
    args: RegisterArgs,
) -> color_eyre::Result<ExitCode> {
    let mut session = Session::open(config, root).await?;

    let contents = fs::read_to_string(&args.file)
        .wrap_err_with(|| format!("failed to read {}", args.file.display()))?;
    let note_type: NoteType = serde_yaml::from_str(&contents)
        .wrap_err_with(|| format!("failed to parse note type in {}", args.file.display()))?;

    let options = RegisterOptions {
        allow_overwrite: args.overwrite,
        validate: true,
        check_compatibility: !args.no_compat_check,
    };

    let id = note_type.id.clone();
    let result = session.registry.register(note_type, options);
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    if !result.valid {
        println!("FAIL register {id}");
        for error in &result.errors {
            println!("  {error}");
        }
        return Ok(ExitCode::FAILURE);
    }

    if let Some(resolved) = session.registry.get(&id) {
        println!("OK   registered {} v{}", resolved.id(), resolved.version());
        if let Some(cache) = session.cache_mut() {
            cache.set(&id, resolved.into_note_type());
        }
    }
    session.save()?;
    info!(%id, "note type registered");
    Ok(ExitCode::SUCCESS)
}
