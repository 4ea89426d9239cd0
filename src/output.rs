//! Rendering of API objects and batch results
//!
//! All console data is printed as JSON, either pretty-printed or one object
//! per line. String values are stripped of control characters before they
//! reach the terminal so that server-supplied text cannot move the cursor or
//! rewrite earlier output.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::Value;

use crate::bulk::Reporter;

/// `--output` choices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// One compact JSON object per line
    Jsonl,
}

/// Recursively strips control characters from every string in `value`
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_string(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (sanitize_string(k), sanitize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn sanitize_string(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect()
}

/// Renders a single object
pub fn render(value: &Value, format: OutputFormat) -> Result<String> {
    let clean = sanitize(value);
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&clean)?,
        OutputFormat::Jsonl => serde_json::to_string(&clean)?,
    })
}

/// Renders a listing: a JSON array, or one line per item
pub fn render_list(items: &[Value], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render(&Value::Array(items.to_vec()), format),
        OutputFormat::Jsonl => {
            let lines = items
                .iter()
                .map(|item| render(item, format))
                .collect::<Result<Vec<_>>>()?;
            Ok(lines.join("\n"))
        }
    }
}

/// Prints successes to stdout and failures to stderr as they happen
pub struct Printer<O, E> {
    format: OutputFormat,
    out: O,
    err: E,
}

impl Printer<io::Stdout, io::Stderr> {
    pub fn stdio(format: OutputFormat) -> Self {
        Self::new(format, io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Printer<O, E> {
    pub fn new(format: OutputFormat, out: O, err: E) -> Self {
        Self { format, out, err }
    }

    pub fn into_parts(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> Reporter<Value> for Printer<O, E> {
    fn success(&mut self, result: &Value) -> Result<()> {
        let text = render(result, self.format)?;
        writeln!(self.out, "{}", text).context("writing result")?;
        Ok(())
    }

    fn failure(&mut self, id: Option<&str>, error: &anyhow::Error) -> Result<()> {
        let message = sanitize_string(&format!("{:#}", error));
        match id {
            Some(id) => writeln!(self.err, "error: {}: {}", sanitize_string(id), message),
            None => writeln!(self.err, "error: {}", message),
        }
        .context("writing failure report")?;
        Ok(())
    }
}
