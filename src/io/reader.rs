//! A reader over one tool report, driven entirely by a schema descriptor.

use std::io::{self, prelude::*};
use std::path::Path;

use thiserror::Error;

use crate::hit::{extract_scan, split_proteins, RawHit};
use crate::schema::{ColumnMap, SchemaError, SynopsisField, ToolSchema};

use super::compression::open_buffered;

/// A fatal error opening or framing a report file
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("schema mismatch: {0}")]
    Schema(
        #[from]
        #[source]
        SchemaError,
    ),
    #[error("encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

/// A recoverable defect on a single data line. The row is dropped and
/// processing continues with the next line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("line {line}: expected at least {required} columns, found {found}")]
    TooFewColumns {
        line: u64,
        required: usize,
        found: usize,
    },
    #[error("line {line}: missing required {field:?}")]
    MissingField { line: u64, field: SynopsisField },
}

impl RowError {
    /// The 1-based input line the defect was seen on
    pub fn line(&self) -> u64 {
        match self {
            Self::TooFewColumns { line, .. } | Self::MissingField { line, .. } => *line,
        }
    }
}

/// Reads one tool report line by line, yielding one [`RawHit`] per data
/// line. The column map is resolved from the first non-empty line: a
/// recognizable header is consumed, anything else falls back to the
/// schema's positional default and is treated as data.
pub struct ReportReaderType<R: io::Read> {
    pub handle: io::BufReader<R>,
    schema: &'static ToolSchema,
    columns: ColumnMap,
    /// An IO failure encountered mid-iteration, terminating the stream
    pub error: Option<io::Error>,
    line_index: u64,
    pending: Option<(u64, String)>,
}

impl<R: io::Read> ReportReaderType<R> {
    pub fn new(source: R, schema: &'static ToolSchema) -> Result<Self, ReportError> {
        let mut handle = io::BufReader::new(source);
        let mut buffer = String::new();
        let mut line_index = 0u64;
        loop {
            buffer.clear();
            let bytes = handle.read_line(&mut buffer)?;
            if bytes == 0 {
                // An empty file still gets a usable positional mapping
                let columns = ColumnMap::positional(schema)?;
                return Ok(Self {
                    handle,
                    schema,
                    columns,
                    error: None,
                    line_index,
                    pending: None,
                });
            }
            line_index += 1;
            let line = buffer.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }
            let (columns, consumed_header) = ColumnMap::detect(schema, line)?;
            let pending = (!consumed_header).then(|| (line_index, line.to_string()));
            return Ok(Self {
                handle,
                schema,
                columns,
                error: None,
                line_index,
                pending,
            });
        }
    }

    pub fn schema(&self) -> &'static ToolSchema {
        self.schema
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    fn parse_row(&self, line: &str, line_index: u64) -> Result<RawHit, RowError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < self.schema.min_columns {
            return Err(RowError::TooFewColumns {
                line: line_index,
                required: self.schema.min_columns,
                found: fields.len(),
            });
        }

        let column = |field: SynopsisField| field_value(&self.columns, &fields, field);
        let number = |field: SynopsisField| -> Option<f64> {
            column(field).and_then(|value| value.parse().ok())
        };

        let scan = column(SynopsisField::Scan)
            .and_then(extract_scan)
            .ok_or(RowError::MissingField {
                line: line_index,
                field: SynopsisField::Scan,
            })?;
        let peptide = column(SynopsisField::Peptide)
            .ok_or(RowError::MissingField {
                line: line_index,
                field: SynopsisField::Peptide,
            })?
            .to_string();

        // Unparsable numeric fields become 0, never a failure, so sorting
        // downstream stays deterministic
        let charge = column(SynopsisField::Charge)
            .and_then(|value| value.parse::<i32>().ok())
            .unwrap_or(0)
            .max(0);

        Ok(RawHit {
            scan,
            charge,
            peptide,
            proteins: column(SynopsisField::Protein)
                .map(split_proteins)
                .unwrap_or_default(),
            primary_score: number(SynopsisField::PrimaryScore).unwrap_or(0.0),
            secondary_score: number(SynopsisField::SecondaryScore).unwrap_or(0.0),
            tool_mass: number(SynopsisField::ToolMass).filter(|mass| *mass > 0.0),
            observed_mass: number(SynopsisField::ObservedMass),
            precursor_mz: number(SynopsisField::PrecursorMz),
            line_index,
        })
    }
}

impl<R: io::Read> Iterator for ReportReaderType<R> {
    type Item = Result<RawHit, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((line_index, line)) = self.pending.take() {
            return Some(self.parse_row(&line, line_index));
        }
        let mut buffer = String::new();
        loop {
            buffer.clear();
            match self.handle.read_line(&mut buffer) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_index += 1;
                    let line = buffer.trim_end_matches(['\r', '\n']);
                    if line.trim().is_empty() {
                        continue;
                    }
                    let line_index = self.line_index;
                    return Some(self.parse_row(line, line_index));
                }
                Err(err) => {
                    self.error = Some(err);
                    return None;
                }
            }
        }
    }
}

fn field_value<'a>(
    columns: &ColumnMap,
    fields: &[&'a str],
    field: SynopsisField,
) -> Option<&'a str> {
    columns
        .get(field)
        .and_then(|position| fields.get(position).copied())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// A report reader over a possibly gzip-compressed file on disk
pub type ReportReader = ReportReaderType<Box<dyn BufRead>>;

impl ReportReaderType<Box<dyn BufRead>> {
    /// Open a report file, transparently decompressing gzip input
    pub fn open_path(path: impl AsRef<Path>, schema: &'static ToolSchema) -> Result<Self, ReportError> {
        Self::new(open_buffered(path.as_ref())?, schema)
    }
}
