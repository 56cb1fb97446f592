use std::path::Path;
use std::process::ExitCode;

use schemata_core::migration::{MigrationError, MigrationRecord, SchemaMigrationManager};
use tabled::{Table, Tabled, settings::Style};

use super::Session;
use crate::MigrateArgs;

#[derive(Tabled)]
struct MigrationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Auto")]
    auto_run: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub async fn run(
    config: Option<&Path>,
    root: Option<&Path>,
    args: MigrateArgs,
) -> color_eyre::Result<ExitCode> {
    let mut session = Session::open(config, root).await?;
    let mut manager = session.migration_manager()?;

    let result = if let Some(id) = args.run.as_deref() {
        manager.execute_migration(&mut session.registry, id).await.map(|r| vec![r])
    } else if args.all {
        manager.execute_all_pending(&mut session.registry).await
    } else if args.auto {
        manager.run_auto_migrations(&mut session.registry).await
    } else {
        print_migrations(&session, &manager);
        return Ok(ExitCode::SUCCESS);
    };

    let ledger_changed = manager.ledger().len() != session.ledger.len();
    session.absorb(&manager);
    if ledger_changed {
        session.save()?;
    }

    match result {
        Ok(records) => {
            if records.is_empty() {
                println!("(no pending migrations)");
            }
            for record in &records {
                print_record(record);
            }
            let failed = records.iter().any(|r| !r.success);
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Err(e @ (MigrationError::UnknownMigration(_) | MigrationError::AlreadyExecuted(_))) => {
            println!("FAIL {e}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            println!("FAIL {e}");
            if let Some(record) = manager.ledger().last() {
                print_record(record);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_migrations(session: &Session, manager: &SchemaMigrationManager) {
    let pending = manager.get_pending_migrations(&session.registry);
    let rows: Vec<MigrationRow> = manager
        .migrations()
        .iter()
        .map(|m| {
            let status = match manager.ledger().iter().rev().find(|r| r.id == m.id()) {
                Some(record) if record.success => "executed",
                Some(_) => "failed",
                None if pending.iter().any(|p| p.id() == m.id()) => "pending",
                None => "up to date",
            };
            MigrationRow {
                id: m.id().to_string(),
                version: m.version().to_string(),
                auto_run: if m.auto_run() { "yes" } else { "no" }.to_string(),
                status: status.to_string(),
                description: m.description().to_string(),
            }
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

fn print_record(record: &MigrationRecord) {
    let status = if record.success { "OK  " } else { "FAIL" };
    println!(
        "{status} {} v{}: {} files affected in {} ms",
        record.id, record.version, record.files_affected, record.duration_ms
    );
    for error in &record.errors {
        println!("  error: {error}");
    }
}
