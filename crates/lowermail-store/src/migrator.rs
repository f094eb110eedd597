use crate::collection::{DocumentSource, WriteBuffer};
use crate::error::Result;
use crate::pages::Pages;
use lowermail_core::{
    inspect_email, Document, EmailCheck, FieldValue, FlushPolicy, MigrationReport,
    DEFAULT_PAGE_SIZE, EMAIL_FIELD,
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    pub page_size: usize,
    pub flush: FlushPolicy,
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            flush: FlushPolicy::default(),
            dry_run: false,
        }
    }
}

/// Scans a collection and rewrites every `email` field that is not already
/// trimmed and lowercased.
pub struct Migrator<'a, S: DocumentSource + ?Sized, W: WriteBuffer + ?Sized> {
    source: &'a S,
    writer: &'a mut W,
    options: MigrationOptions,
}

impl<'a, S: DocumentSource + ?Sized, W: WriteBuffer + ?Sized> Migrator<'a, S, W> {
    pub fn new(source: &'a S, writer: &'a mut W, options: MigrationOptions) -> Self {
        Self {
            source,
            writer,
            options,
        }
    }

    pub fn run(self) -> Result<MigrationReport> {
        let Self {
            source,
            writer,
            options,
        } = self;
        let mut report = MigrationReport::new(source.collection(), options.dry_run);
        let mut pages = Pages::new(source, options.page_size)?;

        info!(
            collection = source.collection(),
            page_size = options.page_size,
            flush = %options.flush,
            dry_run = options.dry_run,
            "starting migration"
        );

        loop {
            let after = pages.cursor().map(|id| id.to_string()).unwrap_or_default();
            let page = match pages.next() {
                None => break,
                Some(Ok(page)) => page,
                Some(Err(err)) => {
                    error!(after = %after, error = %err, "page fetch failed, aborting scan");
                    flush_before_abort(writer, &mut report);
                    return Err(err);
                }
            };
            report.pages += 1;
            info!(after = %after, documents = page.len(), "processing page");

            for document in &page {
                if let Err(err) = process_document(document, writer, &options, &mut report) {
                    error!(id = %document.id, error = %err, "queueing update failed, aborting scan");
                    flush_before_abort(writer, &mut report);
                    return Err(err);
                }
            }

            info!(
                processed = report.processed,
                updated = report.updated,
                "page summary"
            );

            if options.flush == FlushPolicy::Page && !options.dry_run {
                flush(writer, &mut report)?;
            }
        }

        debug!(requests = pages.requests(), "scan complete");
        if !options.dry_run {
            flush(writer, &mut report)?;
        }

        info!(
            processed = report.processed,
            updated = report.updated,
            skipped = report.skipped,
            committed = report.committed,
            failed_writes = report.failed_writes,
            "final summary"
        );
        Ok(report)
    }
}

fn process_document<W: WriteBuffer + ?Sized>(
    document: &Document,
    writer: &mut W,
    options: &MigrationOptions,
    report: &mut MigrationReport,
) -> Result<()> {
    match inspect_email(document) {
        EmailCheck::Missing => {
            debug!(id = %document.id, "no email field");
            report.skipped += 1;
        }
        EmailCheck::NotString { type_name } => {
            debug!(id = %document.id, kind = type_name, "email is not a string");
            report.skipped += 1;
        }
        EmailCheck::Normalized => {}
        EmailCheck::Changed {
            original,
            normalized,
        } => {
            info!(
                id = %document.id,
                original = %original,
                normalized = %normalized,
                dry_run = options.dry_run,
                "update needed"
            );
            if !options.dry_run {
                writer.enqueue_update(&document.id, EMAIL_FIELD, FieldValue::String(normalized))?;
            }
            report.updated += 1;
        }
    }
    report.processed += 1;
    Ok(())
}

fn flush<W: WriteBuffer + ?Sized>(writer: &mut W, report: &mut MigrationReport) -> Result<()> {
    let pending = writer.pending();
    if pending == 0 {
        return Ok(());
    }
    let flushed = writer.flush()?;
    for failure in &flushed.failed {
        warn!(id = %failure.id, error = %failure.message, "write rejected");
    }
    report.committed += flushed.committed;
    report.failed_writes += flushed.failed.len();
    info!(
        pending,
        committed = flushed.committed,
        failed = flushed.failed.len(),
        "flushed updates"
    );
    Ok(())
}

fn flush_before_abort<W: WriteBuffer + ?Sized>(writer: &mut W, report: &mut MigrationReport) {
    if writer.pending() == 0 {
        return;
    }
    match flush(writer, report) {
        Ok(()) => warn!(
            processed = report.processed,
            committed = report.committed,
            "flushed queued updates before aborting"
        ),
        Err(err) => error!(error = %err, "flush before abort failed"),
    }
}
