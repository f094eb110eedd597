use crate::commands::{print_json, Context};
use anyhow::{Context as _, Result};
use lowermail_config::Connection;
use lowermail_firestore::FirestoreClient;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ConfigReport<'a> {
    mode: &'static str,
    project_id: &'a str,
    database: &'a str,
    collection: &'a str,
    page_size: usize,
    flush: &'static str,
    dry_run: bool,
    emulator_host: Option<&'a str>,
    client_email: Option<&'a str>,
    private_key_id: Option<&'a str>,
    credentials_file: Option<String>,
}

/// Builds the client (which parses the private key) but sends nothing.
pub fn check_config(ctx: &Context<'_>) -> Result<()> {
    let settings = ctx.config;
    FirestoreClient::connect(ctx.connection, &settings.firestore.database)
        .with_context(|| "validate credentials")?;

    let (mode, emulator_host, client_email, private_key_id) = match ctx.connection {
        Connection::Emulator { host, .. } => ("emulator", Some(host.as_str()), None, None),
        Connection::ServiceAccount { account, .. } => (
            "service_account",
            None,
            Some(account.client_email.as_str()),
            Some(account.private_key_id.as_str()),
        ),
    };
    let report = ConfigReport {
        mode,
        project_id: ctx.connection.project_id(),
        database: &settings.firestore.database,
        collection: &settings.collection,
        page_size: settings.page_size,
        flush: settings.flush.as_str(),
        dry_run: ctx.dry_run,
        emulator_host,
        client_email,
        private_key_id,
        credentials_file: settings
            .firestore
            .credentials_file
            .as_ref()
            .map(|path| path.display().to_string()),
    };

    if ctx.json {
        return print_json(&report);
    }

    println!("Configuration OK ({})", report.mode);
    println!("  project:    {}", report.project_id);
    println!("  database:   {}", report.database);
    println!("  collection: {}", report.collection);
    println!("  page size:  {}", report.page_size);
    println!("  flush:      {}", report.flush);
    if let Some(host) = report.emulator_host {
        println!("  emulator:   {host}");
    }
    if let Some(email) = report.client_email {
        println!("  account:    {email}");
    }
    if let Some(key_id) = report.private_key_id {
        println!("  key id:     {key_id}");
    }
    if let Some(path) = &report.credentials_file {
        println!("  key file:   {path}");
    }
    Ok(())
}
