//! Bulk input pipeline for create, edit and delete commands
//!
//! A [`BulkRunner`] applies one operation to every record of a batch. Records
//! come from exactly one source per invocation:
//!
//! - command-line flags, with interactive prompts for missing mandatory fields
//! - a JSON file holding a single top-level array of objects
//! - a CSV file whose header row names the fields
//!
//! Each record is attempted exactly once. With `continue_on_error` unset the
//! first failure aborts the batch; with it set, failures are reported and the
//! batch carries on. Malformed input files are fatal either way.

use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value as Json};
use tracing::{debug, info, warn};

use crate::error::InputError;
use crate::fields::{assert_wiring, weak_decode, Field, FieldSource, Prompt, Setter, Value};

/// Supported `--file-format` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Csv,
}

impl FromStr for FileFormat {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(FileFormat::Json),
            "csv" => Ok(FileFormat::Csv),
            other => Err(InputError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Where the records of one invocation come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// One record built from flags and prompts
    Flags,
    /// One record per JSON array element or CSV data row
    File { path: PathBuf, format: FileFormat },
}

impl InputSource {
    /// Picks the file source when `--from-file` was given, flags otherwise
    pub fn from_args(from_file: Option<&Path>, file_format: &str) -> Result<Self, InputError> {
        let format = file_format.parse()?;
        Ok(match from_file {
            Some(path) => InputSource::File {
                path: path.to_path_buf(),
                format,
            },
            None => InputSource::Flags,
        })
    }
}

/// One unit of input
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Values lined up with the declared fields; `None` leaves the target untouched
    Positional(Vec<Option<Value>>),
    /// A decoded file row or element, weak-decoded onto the target as a whole
    WholeObject(Map<String, Json>),
}

/// Batch policy flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOptions {
    pub continue_on_error: bool,
    pub errors_only: bool,
    /// Multi-record command (create/delete); `false` for single-object edits
    pub multi: bool,
}

/// Result of one record
#[derive(Debug)]
pub enum Outcome<R> {
    Success(R),
    Failure {
        id: Option<String>,
        error: anyhow::Error,
    },
}

impl<R> Outcome<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Outcomes of a batch, in input order
#[derive(Debug)]
pub struct BatchReport<R> {
    pub outcomes: Vec<Outcome<R>>,
}

impl<R> BatchReport<R> {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Receives per-record results as they happen
///
/// A reporter error ends the batch regardless of `continue_on_error`.
pub trait Reporter<R> {
    fn success(&mut self, result: &R) -> Result<()>;
    fn failure(&mut self, id: Option<&str>, error: &anyhow::Error) -> Result<()>;
}

/// Discards everything; the batch report still records each outcome
impl<R> Reporter<R> for () {
    fn success(&mut self, _result: &R) -> Result<()> {
        Ok(())
    }

    fn failure(&mut self, _id: Option<&str>, _error: &anyhow::Error) -> Result<()> {
        Ok(())
    }
}

type Identify<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// Drives an operation over the records of one input source
pub struct BulkRunner<T> {
    fields: Vec<Field>,
    setters: Vec<Setter<T>>,
    options: BulkOptions,
    identify: Option<Identify<T>>,
}

impl<T> BulkRunner<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// # Panics
    ///
    /// Panics if `setters` does not line up with `fields` by count and type.
    pub fn new(fields: Vec<Field>, setters: Vec<Setter<T>>, options: BulkOptions) -> Self {
        assert_wiring(&fields, &setters);
        Self {
            fields,
            setters,
            options,
            identify: None,
        }
    }

    /// Sets how a failed record is named in failure reports
    pub fn identify_with(mut self, f: impl Fn(&T) -> Option<String> + Send + Sync + 'static) -> Self {
        self.identify = Some(Box::new(f));
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Builds the single flag-mode record
    ///
    /// Multi-record commands fill every slot, prompting for mandatory fields
    /// the user did not supply and defaulting the rest. Single-object edits
    /// only fill the slots that were given explicitly.
    pub fn flag_record(&self, flags: &dyn FieldSource, prompt: &mut dyn Prompt) -> Result<Record, InputError> {
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = match flags.explicit(field) {
                Some(value) => {
                    field.check(&value)?;
                    Some(value)
                }
                None if !self.options.multi => None,
                None if field.mandatory => Some(prompt.ask(field)?),
                None => Some(field.default_value()),
            };
            values.push(value);
        }
        Ok(Record::Positional(values))
    }

    /// Applies `record` to a copy of `seed`
    pub fn place(&self, seed: &T, record: Record) -> Result<T> {
        match record {
            Record::Positional(values) => {
                let mut target = seed.clone();
                for (setter, value) in self.setters.iter().zip(values) {
                    if let Some(value) = value {
                        setter.apply(&mut target, value);
                    }
                }
                Ok(target)
            }
            Record::WholeObject(raw) => weak_decode(&self.fields, seed, &raw),
        }
    }

    /// Runs `operation` once per record and collects the outcomes
    ///
    /// Usage, I/O and file parse errors abort before or during iteration;
    /// operation failures follow the `continue_on_error` policy.
    pub async fn run<R, F, Fut>(
        &self,
        source: &InputSource,
        seed: &T,
        flags: &dyn FieldSource,
        prompt: &mut dyn Prompt,
        reporter: &mut dyn Reporter<R>,
        mut operation: F,
    ) -> Result<BatchReport<R>>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut records = match source {
            InputSource::Flags => Records::Single(Some(self.flag_record(flags, prompt)?)),
            InputSource::File { .. } if !self.options.multi => {
                return Err(InputError::FileNotAllowed.into());
            }
            InputSource::File { path, format } => Records::open(path, *format).await?,
        };

        let mut outcomes = Vec::new();
        let mut index = 0usize;
        while let Some(record) = records.next_record() {
            let record = record?;
            index += 1;
            debug!("Processing record {}", index);

            let result = match self.place(seed, record) {
                Ok(target) => {
                    let id = self.identify.as_ref().and_then(|f| f(&target));
                    operation(target).await.map_err(|e| (id, e))
                }
                Err(e) => Err((None, e)),
            };

            match result {
                Ok(value) => {
                    if !self.options.errors_only {
                        reporter.success(&value)?;
                    }
                    outcomes.push(Outcome::Success(value));
                }
                Err((id, error)) => {
                    if !self.options.continue_on_error {
                        return Err(error);
                    }
                    warn!(
                        "Record {} ({}) failed: {:#}",
                        index,
                        id.as_deref().unwrap_or("-"),
                        error
                    );
                    reporter.failure(id.as_deref(), &error)?;
                    outcomes.push(Outcome::Failure { id, error });
                }
            }
        }

        let report = BatchReport { outcomes };
        info!(
            "Processed {} records: {} succeeded, {} failed",
            report.outcomes.len(),
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }
}

/// Lazily yielded records of one source
enum Records {
    Single(Option<Record>),
    Json(std::vec::IntoIter<Record>),
    Csv(CsvRecords),
}

impl Records {
    async fn open(path: &Path, format: FileFormat) -> Result<Self, InputError> {
        let display = path.display().to_string();
        let bytes = tokio::fs::read(path).await.map_err(|source| InputError::Io {
            path: display.clone(),
            source,
        })?;

        match format {
            FileFormat::Json => Ok(Records::Json(parse_json_records(&display, &bytes)?.into_iter())),
            FileFormat::Csv => Ok(Records::Csv(CsvRecords::new(display, bytes)?)),
        }
    }

    fn next_record(&mut self) -> Option<Result<Record, InputError>> {
        match self {
            Records::Single(record) => record.take().map(Ok),
            Records::Json(records) => records.next().map(Ok),
            Records::Csv(records) => records.next_record(),
        }
    }
}

/// Decodes a JSON array of objects into whole-object records
pub fn parse_json_records(path: &str, bytes: &[u8]) -> Result<Vec<Record>, InputError> {
    let document: Json = serde_json::from_slice(bytes).map_err(|e| InputError::Parse {
        path: path.to_string(),
        source: Box::new(e),
    })?;

    let Json::Array(elements) = document else {
        return Err(InputError::NotAnArray {
            path: path.to_string(),
        });
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| match element {
            Json::Object(map) => Ok(Record::WholeObject(map)),
            _ => Err(InputError::NotAnObject {
                path: path.to_string(),
                index,
            }),
        })
        .collect()
}

/// CSV rows as whole-object records, keyed by the header row
///
/// Rows are read one at a time so that a malformed row only stops the batch
/// once the rows before it have been processed.
pub struct CsvRecords {
    path: String,
    reader: csv::Reader<Cursor<Vec<u8>>>,
    headers: csv::StringRecord,
}

impl CsvRecords {
    pub fn new(path: String, bytes: Vec<u8>) -> Result<Self, InputError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(Cursor::new(bytes));

        let headers = reader
            .headers()
            .map_err(|e| InputError::Parse {
                path: path.clone(),
                source: Box::new(e),
            })?
            .clone();
        if headers.is_empty() || headers.iter().all(str::is_empty) {
            return Err(InputError::MissingHeader { path });
        }

        Ok(Self { path, reader, headers })
    }

    pub fn next_record(&mut self) -> Option<Result<Record, InputError>> {
        let mut row = csv::StringRecord::new();
        match self.reader.read_record(&mut row) {
            Ok(false) => None,
            Ok(true) => {
                if row.len() != self.headers.len() {
                    // file line the record starts on, header included
                    let line = row.position().map_or(0, |p| p.line());
                    return Some(Err(InputError::ColumnMismatch {
                        path: self.path.clone(),
                        row: line,
                        expected: self.headers.len(),
                        found: row.len(),
                    }));
                }
                let map = self
                    .headers
                    .iter()
                    .zip(row.iter())
                    .map(|(key, cell)| (key.to_string(), Json::String(cell.to_string())))
                    .collect();
                Some(Ok(Record::WholeObject(map)))
            }
            Err(e) => Some(Err(InputError::Parse {
                path: self.path.clone(),
                source: Box::new(e),
            })),
        }
    }
}
