use crate::commands::{print_json, Context};
use crate::error::failed_writes;
use anyhow::{Context as _, Result};
use lowermail_core::MigrationReport;
use lowermail_firestore::FirestoreClient;
use lowermail_store::{MigrationOptions, Migrator};
use tracing::info;

pub fn run(ctx: &Context<'_>) -> Result<()> {
    let settings = ctx.config;
    let client = FirestoreClient::connect(ctx.connection, &settings.firestore.database)
        .with_context(|| "connect to firestore")?;
    info!(
        project = client.project_id(),
        database = %settings.firestore.database,
        emulator = client.is_emulator(),
        "connected"
    );

    let collection = client.collection(&settings.collection);
    let mut writer = client.bulk_writer(&settings.collection);
    let options = MigrationOptions {
        page_size: settings.page_size,
        flush: settings.flush,
        dry_run: ctx.dry_run,
    };
    let report = Migrator::new(&collection, &mut writer, options)
        .run()
        .with_context(|| format!("migrate collection {}", settings.collection))?;

    print_report(ctx, &report)?;
    if !report.is_clean() {
        return Err(failed_writes(report.failed_writes));
    }
    Ok(())
}

fn print_report(ctx: &Context<'_>, report: &MigrationReport) -> Result<()> {
    if ctx.json {
        return print_json(report);
    }

    if report.dry_run {
        println!(
            "Dry run on {}: processed {} documents, {} would be updated, {} skipped",
            report.collection, report.processed, report.updated, report.skipped
        );
        return Ok(());
    }
    println!(
        "Normalized {}: processed {} documents, updated {}, skipped {}",
        report.collection, report.processed, report.updated, report.skipped
    );
    if report.failed_writes > 0 {
        println!(
            "Committed {} writes, {} rejected (see log for document ids)",
            report.committed, report.failed_writes
        );
    }
    Ok(())
}
