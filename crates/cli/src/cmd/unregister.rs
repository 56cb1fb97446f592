use std::path::Path;
use std::process::ExitCode;

use super::Session;

pub async fn run(
    config: Option<&Path>,
    root: Option<&Path>,
    id: &str,
) -> color_eyre::Result<ExitCode> {
    let mut session = Session::open(config, root).await?;

    if session.registry.unregister(id).is_none() {
        println!("FAIL unknown note type: {id}");
        return Ok(ExitCode::FAILURE);
    }
    if let Some(cache) = session.cache_mut() {
        cache.invalidate(id);
    }
    session.save()?;
    println!("OK   unregistered {id}");
    Ok(ExitCode::SUCCESS)
}
