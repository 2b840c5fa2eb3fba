use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pipebridge_codec::{to_json, TypedArray, Value};
use serde::Serialize;

use crate::exit::{codec_error, CliResult};

/// Elements shown before an array preview is cut short.
const ARRAY_PREVIEW_LEN: usize = 8;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print a call result. JSON output is the wire document itself.
pub fn print_value(function: &str, value: &Value, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let json = to_json(value).map_err(|err| codec_error("cannot print result", err))?;
            println!("{json}");
        }
        OutputFormat::Pretty => {
            let json = to_json(value).map_err(|err| codec_error("cannot print result", err))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "KIND", "VALUE"]);
            match value {
                Value::Mapping(map) => {
                    for (key, item) in map {
                        table.add_row(vec![key.clone(), item.kind().to_string(), summarize(item)]);
                    }
                }
                other => {
                    table.add_row(vec![
                        function.to_string(),
                        other.kind().to_string(),
                        summarize(other),
                    ]);
                }
            }
            println!("{table}");
        }
    }
    Ok(())
}

/// One-line rendering of a value for table cells.
pub fn summarize(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Text(s) => s.clone(),
        Value::Sequence(items) => format!("[{} items]", items.len()),
        Value::Mapping(map) => format!("{{{} keys}}", map.len()),
        Value::Array(array) => summarize_array(array),
    }
}

fn summarize_array(array: &TypedArray) -> String {
    let dims = array
        .shape()
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join("x");
    let values = array.to_f64_vec();
    let mut preview = values
        .iter()
        .take(ARRAY_PREVIEW_LEN)
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if values.len() > ARRAY_PREVIEW_LEN {
        preview.push_str(", ...");
    }
    format!("{}[{dims}] [{preview}]", array.element_type())
}

#[derive(Serialize)]
pub struct FunctionEntry {
    pub name: &'static str,
    pub summary: &'static str,
}

pub fn print_functions(entries: &[FunctionEntry], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FUNCTION", "DESCRIPTION"]);
            for entry in entries {
                table.add_row(vec![entry.name, entry.summary]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
            for entry in entries {
                println!("{:<width$}  {}", entry.name, entry.summary);
            }
        }
    }
}
