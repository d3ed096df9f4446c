//! Output formatting for CLI commands.

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

const CLI_SCHEMA_VERSION: &str = "refctl.v1";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

/// Print data in the specified format.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No items found.".dimmed());
            } else {
                let table = Table::new(data).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            println!("{}", format_json(data, "[]"));
        }
    }
}

/// Print a single item as JSON.
pub fn print_single<T: Serialize>(data: &T) {
    println!("{}", format_json(data, "{}"));
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", "Warning:".yellow().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str) -> String {
    let value = serde_json::to_value(data).unwrap_or_else(|_| serde_json::json!({}));
    let wrapped = wrap_with_schema(value);
    let sorted = sort_json_value(wrapped);
    serde_json::to_string_pretty(&sorted).unwrap_or_else(|_| fallback.to_string())
}

fn wrap_with_schema(value: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "schemaVersion": CLI_SCHEMA_VERSION,
        "data": value
    })
}

fn sort_json_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(values) => {
            serde_json::Value::Array(values.into_iter().map(sort_json_value).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut pairs: Vec<_> = entries.into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut mapped = serde_json::Map::new();
            for (key, value) in pairs {
                mapped.insert(key, sort_json_value(value));
            }
            serde_json::Value::Object(mapped)
        }
        other => other,
    }
}
