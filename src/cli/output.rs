//! Output formatting for CLI commands.

use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::cli::args::{CoreirArgs, OutputFormat};
use crate::evaluation::EvaluationReport;

/// Keys printed as raw blocks rather than as fields in human output.
const STREAM_KEYS: &[&str] = &["stdout", "stderr"];

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &CoreirArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Print the evaluation streams in human mode; JSON output already carries them.
pub fn output_streams(report: &EvaluationReport, args: &CoreirArgs) -> Result<()> {
    if args.output_format == OutputFormat::Human {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out)?;
        report.write_streams(&mut out)?;
        out.flush()?;
    }
    Ok(())
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &CoreirArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    let mut lines = Vec::new();
    render_human(&value, 0, &mut lines);
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn render_human(value: &Value, indent: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(obj) => {
            for (key, val) in obj {
                if STREAM_KEYS.contains(&key.as_str()) {
                    continue;
                }
                match val {
                    Value::Object(_) => {
                        lines.push(format!("{pad}{key}:"));
                        render_human(val, indent + 1, lines);
                    }
                    Value::Array(items) if items.iter().any(Value::is_object) => {
                        lines.push(format!("{pad}{key}:"));
                        for item in items {
                            lines.push(format!("{pad}  -"));
                            render_human(item, indent + 2, lines);
                        }
                    }
                    _ if key == "bytes" => {
                        lines.push(format!("{pad}{key}: {}", format_bytes_value(val)));
                    }
                    _ => lines.push(format!("{pad}{key}: {}", format_value(val))),
                }
            }
        }
        _ => lines.push(format!("{pad}{}", format_value(value))),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &CoreirArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        Value::Object(_) => "[object]".to_string(),
        Value::Null => "-".to_string(),
    }
}

fn format_bytes_value(value: &Value) -> String {
    match value.as_u64() {
        Some(bytes) => format_bytes(bytes),
        None => format_value(value),
    }
}

/// Format bytes into human-readable format.
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(8_589_934_592), "8.0 GB");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!("run.txt")), "run.txt");
        assert_eq!(format_value(&json!(42)), "42");
        assert_eq!(format_value(&json!([1, 2])), "[1, 2]");
        assert_eq!(format_value(&Value::Null), "-");
    }

    #[test]
    fn test_render_nested_report() {
        let value = json!({
            "acquisition": {"path": "docs.trec.gz", "bytes": 2048},
            "evaluation": {"status": 0, "stdout": "MRR: 0.3", "stderr": ""}
        });
        let mut lines = Vec::new();
        render_human(&value, 0, &mut lines);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "acquisition:");
        assert!(lines.contains(&"  path: docs.trec.gz".to_string()));
        assert!(lines.contains(&"  bytes: 2.0 KB".to_string()));
        assert!(lines.contains(&"  status: 0".to_string()));
        assert!(!lines.iter().any(|line| line.contains("MRR")));
    }
}
