use std::io::{self, Write};

use serde_json::{Map, Value};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::metadata::Envelope;

pub fn render(envelope: &Envelope, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            writeln!(out, "{payload}")?;
        }
        OutputFormat::Table => render_table(&mut out, envelope)?,
    }
    Ok(())
}

fn render_table(out: &mut impl Write, envelope: &Envelope) -> Result<(), CliError> {
    writeln!(out, "request_id: {}", envelope.meta.request_id)?;
    writeln!(out, "command   : {}", envelope.meta.command)?;
    writeln!(out, "elapsed_ms: {}", envelope.meta.elapsed_ms)?;

    if !envelope.meta.warnings.is_empty() {
        writeln!(out, "warnings:")?;
        for warning in &envelope.meta.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }

    let Value::Object(fields) = &envelope.data else {
        writeln!(out, "{}", serde_json::to_string_pretty(&envelope.data)?)?;
        return Ok(());
    };

    for (name, value) in fields {
        match value {
            Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
                writeln!(out, "{name}:")?;
                for line in table_lines(items) {
                    writeln!(out, "  {line}")?;
                }
            }
            Value::Array(items) if items.is_empty() => writeln!(out, "{name}: (none)")?,
            Value::Object(_) | Value::Array(_) => {
                writeln!(out, "{name}:")?;
                for line in serde_json::to_string_pretty(value)?.lines() {
                    writeln!(out, "  {line}")?;
                }
            }
            scalar => writeln!(out, "{name}: {}", cell(scalar))?,
        }
    }
    Ok(())
}

/// Aligned columns for an array of flat objects; nested values are printed
/// as compact JSON. Columns follow the first row's field order.
fn table_lines(rows: &[Value]) -> Vec<String> {
    let empty = Map::new();
    let first = rows.first().and_then(Value::as_object).unwrap_or(&empty);
    let columns: Vec<&String> = first.keys().collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column.as_str()).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let format_row = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_row(columns.iter().map(|column| column.as_str()).collect()));
    for row in &cells {
        lines.push(format_row(row.iter().map(String::as_str).collect()));
    }
    lines
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() => format!("{float:.4}"),
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}
