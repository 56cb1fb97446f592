use std::path::Path;
use std::process::ExitCode;

use schemata_core::cache::{JsonFileCache, TypeCache};
use schemata_core::config::{ConfigLoader, default_config_path};
use schemata_core::state::StateFile;

use crate::logging;

pub fn run(config: Option<&Path>, root: Option<&Path>) -> color_eyre::Result<ExitCode> {
    let rc = match ConfigLoader::load(config, root) {
        Ok(rc) => rc,
        Err(e) => {
            println!("FAIL schemata doctor");
            println!("{e}");
            if config.is_none() {
                println!("looked for: {}", default_config_path().display());
            }
            return Ok(ExitCode::FAILURE);
        }
    };
    logging::init(&rc)?;

    let state = match StateFile::load(&rc.state_file) {
        Ok(state) => state,
        Err(e) => {
            println!("FAIL schemata doctor");
            println!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("OK   schemata doctor");
    println!("path: {}", rc.config_path.display());
    println!("root: {}", rc.root.display());
    println!("type_field: {}", rc.type_field);
    println!("version_field: {}", rc.version_field);
    println!("extension: {}", rc.extension);
    println!("state_file: {}", rc.state_file.display());
    println!("types: {}", state.registry.note_types.len());
    println!("migrations executed: {}", state.ledger.len());

    if rc.cache.enabled {
        let mut cache = TypeCache::new(rc.cache_options())
            .with_persistence(Box::new(JsonFileCache::new(&rc.cache.file)));
        let warmed = cache.warm_up();
        println!("cache: {} ({warmed} entries)", rc.cache.file.display());
    } else {
        println!("cache: disabled");
    }
    println!("backup_dir: {}", rc.migrations.backup_dir.display());
    Ok(ExitCode::SUCCESS)
}
