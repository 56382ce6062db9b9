//! Reading tool report files and writing the canonical synopsis format.

pub mod reader;
pub mod writer;

pub(crate) mod compression;

pub use crate::io::compression::{is_gzipped, is_gzipped_extension};
pub use crate::io::reader::{ReportError, ReportReader, ReportReaderType, RowError};
pub use crate::io::writer::{SynopsisWriter, SynopsisWriterType};
