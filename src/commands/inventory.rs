//! Commands: query the cached system inventory.
use std::fmt::Write as _;

use anyhow::Result;

use crate::cli::InventoryCommand;
use crate::context::Context;
use crate::inventory::{HostKind, InventoryCache, InventoryCategory, Record};

/// One `key: value` line per field, records separated by a blank line.
#[must_use]
pub fn render_records(records: &[Record]) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for key in record.keys() {
            if let Some(value) = record.try_get(key) {
                let _ = writeln!(out, "{key}: {value}");
            }
        }
    }
    out
}

/// Text printed for `cmd`.
///
/// # Errors
///
/// Returns an error for unknown categories, missing fields and profiler
/// failures.
pub fn output(cache: &InventoryCache, cmd: &InventoryCommand) -> Result<String> {
    let text = match cmd {
        InventoryCommand::Types => cache
            .categories()?
            .iter()
            .map(|c| format!("{c}\n"))
            .collect(),
        InventoryCommand::Get { category, json } => {
            let category: InventoryCategory = category.parse()?;
            if *json {
                let mut text = serde_json::to_string_pretty(&cache.to_json(&category)?)?;
                text.push('\n');
                text
            } else {
                render_records(&cache.get(&category)?.items)
            }
        }
        InventoryCommand::Field { category, field } => {
            let category: InventoryCategory = category.parse()?;
            format!("{}\n", cache.field(&category, field)?)
        }
        InventoryCommand::Find {
            category,
            field,
            substring,
        } => {
            let category: InventoryCategory = category.parse()?;
            render_records(&cache.find(&category, field, substring)?)
        }
        InventoryCommand::Keys { category } => {
            let category: InventoryCategory = category.parse()?;
            cache.keys(&category)?.iter().map(|k| format!("{k}\n")).collect()
        }
    };
    Ok(text)
}

/// Run an `inventory` subcommand.
///
/// # Errors
///
/// See [`output`].
pub fn run(ctx: &Context, cmd: &InventoryCommand) -> Result<()> {
    let text = output(&ctx.inventory(), cmd)?;
    super::emit(&text);
    Ok(())
}

/// Print `laptop` or `desktop`.
///
/// # Errors
///
/// Returns an error if the Hardware inventory cannot be read.
pub fn run_host_kind(ctx: &Context) -> Result<()> {
    let kind = HostKind::detect(&ctx.inventory())?;
    super::emit(&kind.to_string());
    Ok(())
}
