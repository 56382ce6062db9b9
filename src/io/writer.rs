//! Writing normalized records in the canonical synopsis column order.

use std::fs;
use std::io::{self, prelude::*};

use crate::hit::SynopsisRecord;
use crate::schema::ToolSchema;

/// Writes the synopsis file: one header line in the canonical column order
/// for the tool family, then one row per record. The dense 1-based
/// `ResultID` sequence is assigned here, at write time, after all sorting,
/// filtering and expansion upstream.
pub struct SynopsisWriterType<W: io::Write> {
    pub handle: io::BufWriter<W>,
    schema: &'static ToolSchema,
    result_id: u32,
    wrote_header: bool,
}

pub type SynopsisWriter = SynopsisWriterType<fs::File>;

impl<W: io::Write> SynopsisWriterType<W> {
    pub fn new(sink: W, schema: &'static ToolSchema) -> Self {
        Self {
            handle: io::BufWriter::new(sink),
            schema,
            result_id: 0,
            wrote_header: false,
        }
    }

    /// The canonical column names for this tool family, in output order
    pub fn column_names(&self) -> Vec<String> {
        let primary = self.schema.primary_score_name;
        let mut columns = vec![
            "ResultID".to_string(),
            "Scan".to_string(),
            "Charge".to_string(),
            "PrecursorMZ".to_string(),
            "DelM".to_string(),
            "DelM_PPM".to_string(),
            "MH".to_string(),
            "Peptide".to_string(),
            "Protein".to_string(),
            primary.to_string(),
            format!("Rank_{primary}"),
            format!("DeltaNorm_{primary}"),
        ];
        if let Some(secondary) = self.schema.secondary_score_name {
            columns.push(secondary.to_string());
        }
        columns.push("FDR".to_string());
        columns.push("QValue".to_string());
        columns
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        self.wrote_header = true;
        writeln!(self.handle, "{}", self.column_names().join("\t"))
    }

    pub fn write_record(&mut self, record: &SynopsisRecord) -> io::Result<()> {
        if !self.wrote_header {
            self.write_header()?;
        }
        self.result_id += 1;
        let mut row = vec![
            self.result_id.to_string(),
            record.hit.scan.to_string(),
            record.hit.charge.to_string(),
            format!("{:.4}", record.hit.precursor_mz.unwrap_or_default()),
            format!("{:.4}", record.delta_mass),
            format!("{:.4}", record.delta_mass_ppm),
            format!("{:.4}", record.mh),
            record.hit.peptide.clone(),
            record.hit.primary_protein().to_string(),
            record.hit.primary_score.to_string(),
            record.rank.to_string(),
            format!("{:.4}", record.delta_norm_score),
        ];
        if self.schema.secondary_score_name.is_some() {
            row.push(record.hit.secondary_score.to_string());
        }
        row.push(record.fdr.to_string());
        row.push(record.q_value.to_string());
        writeln!(self.handle, "{}", row.join("\t"))
    }

    /// How many records have been written so far
    pub fn records_written(&self) -> u32 {
        self.result_id
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.handle.flush()
    }
}
