use anyhow::Result;
use lowermail_config::{AppConfig, Connection};
use serde::Serialize;
use std::io::{self, Write};

pub mod check;
pub mod completions;
pub mod migrate;

pub struct Context<'a> {
    pub config: &'a AppConfig,
    pub connection: &'a Connection,
    pub json: bool,
    pub dry_run: bool,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
