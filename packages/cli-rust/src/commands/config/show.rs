//! Config show subcommand
//!
//! Displays the effective configuration in table or JSON format. Fields
//! come from serde serialization, so new Config fields show up unchanged.

use crate::commands::CommandContext;
use anyhow::{Result, anyhow};
use comfy_table::{Cell, Color, Table};
use eps_deploy_core::Config;
use serde_json::Value;

pub fn cmd_config_show(ctx: &CommandContext, json: bool) -> Result<i32> {
    if json {
        println!("{}", serde_json::to_string_pretty(&ctx.config)?);
        return Ok(0);
    }

    println!("{}", config_table(&ctx.config)?);
    println!();
    let suffix = if ctx.config_path.exists() {
        ""
    } else {
        " (not created, showing defaults)"
    };
    println!("Config file: {}{suffix}", ctx.config_path.display());
    Ok(0)
}

fn config_table(config: &Config) -> Result<Table> {
    let value = serde_json::to_value(config)?;
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("Config did not serialize to an object"))?;
    let defaults = serde_json::to_value(Config::default())?;

    let mut table = Table::new();
    table.set_header(vec!["Key", "Value"]);
    for (key, val) in obj {
        let mut cell = Cell::new(format_value(val));
        // Highlight anything the user changed
        if defaults.get(key) != Some(val) {
            cell = cell.fg(Color::Cyan);
        }
        table.add_row(vec![Cell::new(key), cell]);
    }
    Ok(table)
}

/// Format a JSON value for display
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "(not set)".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(arr) => format_array(arr),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn format_array(arr: &[Value]) -> String {
    if arr.is_empty() {
        return "(none)".to_string();
    }

    arr.iter()
        .filter_map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
