//! `mzsynopsis` normalizes the heterogeneous, versioned, tab-separated
//! reports written by peptide identification search engines into one
//! canonical "synopsis" record format used by downstream analysis.
//!
//! Each supported tool is described by an immutable [`schema::ToolSchema`]
//! value: the recognized header names per semantic field (with aliases for
//! older layout versions), the positional fallback for headerless files,
//! and the direction of the tool's primary score. One engine,
//! [`processor::SynopsisProcessor`], runs the whole per-file pipeline for
//! any descriptor: parse rows, resolve inline modification annotations,
//! reconcile theoretical masses, rank hits within each scan, estimate the
//! decoy-based false discovery rate, derive monotonic Q-values, expand
//! peptides over the proteins they map to, and write the synopsis file.
//!
//! ```no_run
//! use mzsynopsis::processor::{ProcessingOptions, SynopsisProcessor};
//! use mzsynopsis::schema::MSGF_PLUS;
//!
//! # fn main() -> Result<(), mzsynopsis::processor::ProcessingError> {
//! let processor = SynopsisProcessor::new(&MSGF_PLUS, ProcessingOptions::default());
//! let summary = processor.process_path("report.tsv", "report_syn.txt", None)?;
//! println!("{} rows written", summary.rows_written);
//! # Ok(())
//! # }
//! ```

pub mod fdr;
pub mod hit;
pub mod io;
pub mod mass;
pub mod mass_error;
pub mod modification;
pub mod processor;
pub mod protein_map;
pub mod ranking;
pub mod schema;
pub mod utils;

pub use crate::fdr::DecoyMatcher;
pub use crate::hit::{RawHit, SynopsisRecord};
pub use crate::io::reader::{ReportError, ReportReader, ReportReaderType, RowError};
pub use crate::io::writer::{SynopsisWriter, SynopsisWriterType};
pub use crate::mass::ResidueMasses;
pub use crate::mass_error::Tolerance;
pub use crate::modification::{ModificationParser, ModificationToken, Terminus};
pub use crate::processor::{
    ProcessingError, ProcessingOptions, ProcessingSummary, SynopsisProcessor,
};
pub use crate::protein_map::{PeptideProteinEntry, PeptideProteinMap};
pub use crate::schema::{ColumnMap, ScoreDirection, SynopsisField, ToolSchema};
