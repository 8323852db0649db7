use serde_json::{json, Map, Value};
use std::io::{self, BufRead, Write};
use thiserror::Error;

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&success_body(message, data))?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Failure already printed to the user; the binary only sets the exit code.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ReportedError {
    pub message: String,
}

/// Output an error message in the appropriate format, then fail the command
pub fn output_error(
    output_format: OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&error_body(message, error_code))?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Err(ReportedError {
        message: message.to_string(),
    }
    .into())
}

/// Output labelled fields, or the raw object as JSON
pub fn output_fields(output_format: OutputFormat, details: Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        OutputFormat::Text => {
            if let Some(fields) = details.as_object() {
                for (name, value) in fields {
                    match value {
                        Value::Null => println!("{}: -", name),
                        Value::String(s) => println!("{}: {}", name, s),
                        other => println!("{}: {}", name, other),
                    }
                }
            }
        }
    }
    Ok(())
}

fn success_body(message: &str, data: Option<Value>) -> Value {
    let mut response = Map::new();
    response.insert("success".to_string(), json!(true));
    response.insert("message".to_string(), json!(message));

    // Merge object payloads at the top level; anything else goes under "data"
    match data {
        Some(Value::Object(fields)) => response.extend(fields),
        Some(other) => {
            response.insert("data".to_string(), other);
        }
        None => {}
    }
    Value::Object(response)
}

fn error_body(message: &str, error_code: Option<&str>) -> Value {
    let mut response = json!({
        "success": false,
        "error": message
    });

    if let Some(code) = error_code {
        response["error_code"] = json!(code);
    }
    response
}

/// Read a password from `HRDESK_PASSWORD` or one line of stdin
pub fn read_password(provided: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    if let Ok(password) = std::env::var("HRDESK_PASSWORD") {
        return Ok(password);
    }

    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}
