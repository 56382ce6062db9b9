//! The per-file normalization pipeline: parse → buffer → rank → filter →
//! confidence sort → FDR/Q-value → protein expansion → write.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::fdr::{assign_fdr, assign_q_values, DecoyMatcher};
use crate::hit::{split_flanks, RawHit, SynopsisRecord};
use crate::io::compression::open_buffered;
use crate::io::reader::{ReportError, ReportReaderType};
use crate::io::writer::SynopsisWriterType;
use crate::mass::{reconcile, ResidueMasses};
use crate::modification::{
    apply_static_modifications, clean_sequence, snap_to_known_masses, ModificationParser,
    StaticModification, SymbolicModification,
};
use crate::protein_map::PeptideProteinMap;
use crate::ranking::rank_by_scan;
use crate::schema::ToolSchema;
use crate::utils::neutral_mass;

/// The per-run configuration surface. Values vary between runs and tools;
/// behavior does not.
#[derive(Debug, Clone)]
pub struct ProcessingOptions {
    /// Keep-threshold on the primary score, applied in the schema's score
    /// direction. `None` keeps every ranked hit.
    pub score_threshold: Option<f64>,
    /// DeltaNormScore assigned to the last hit of every scan group
    pub delta_norm_default: f64,
    /// Decimal digits used when matching parsed modification masses against
    /// the configured dynamic modification definitions
    pub mass_digits: u32,
    pub static_modifications: Vec<StaticModification>,
    pub symbolic_modifications: Vec<SymbolicModification>,
    /// Known dynamic modification masses that parsed tokens snap to
    pub dynamic_modification_masses: Vec<f64>,
    pub decoy: DecoyMatcher,
    pub residue_masses: ResidueMasses,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            score_threshold: None,
            delta_norm_default: 0.0,
            mass_digits: 3,
            static_modifications: Vec::new(),
            symbolic_modifications: Vec::new(),
            dynamic_modification_masses: Vec::new(),
            decoy: DecoyMatcher::default(),
            residue_masses: ResidueMasses::default(),
        }
    }
}

/// A fatal failure of one file's pipeline
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
    #[error("processing aborted by caller request")]
    Aborted,
}

/// Row-level defect messages, capped by total character length so a
/// pathological file cannot grow the log without bound
#[derive(Debug, Clone)]
pub struct BoundedErrorLog {
    entries: Vec<String>,
    used: usize,
    capacity: usize,
    truncated: u64,
}

impl BoundedErrorLog {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            used: 0,
            capacity,
            truncated: 0,
        }
    }

    pub fn push(&mut self, message: String) {
        if self.used + message.len() <= self.capacity {
            self.used += message.len();
            self.entries.push(message);
        } else {
            self.truncated += 1;
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many defects no longer fit within the capacity
    pub fn truncated(&self) -> u64 {
        self.truncated
    }
}

impl Default for BoundedErrorLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// What one file's pass read, dropped, filtered and wrote
#[derive(Debug, Clone, Default)]
pub struct ProcessingSummary {
    pub rows_read: u64,
    pub rows_dropped: u64,
    pub rows_filtered: u64,
    pub rows_written: u64,
    pub error_log: BoundedErrorLog,
}

/// Runs the whole normalization pipeline for one report file. The engine is
/// parameterized by an immutable [`ToolSchema`] descriptor; every supported
/// tool is a configuration value, not a subtype.
pub struct SynopsisProcessor {
    schema: &'static ToolSchema,
    options: ProcessingOptions,
    abort: Arc<AtomicBool>,
}

impl SynopsisProcessor {
    pub fn new(schema: &'static ToolSchema, options: ProcessingOptions) -> Self {
        Self {
            schema,
            options,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn schema(&self) -> &'static ToolSchema {
        self.schema
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    /// A flag callers may set from another thread to stop the current
    /// file's pipeline at the next input line
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Run the pipeline from an open stream into an open sink. Each file is
    /// independent; the buffers live only for the duration of this call.
    pub fn process<R: io::Read, W: io::Write>(
        &self,
        source: R,
        sink: W,
        protein_map: Option<&PeptideProteinMap>,
    ) -> Result<ProcessingSummary, ProcessingError> {
        let mut summary = ProcessingSummary::default();
        let mut reader = ReportReaderType::new(source, self.schema)?;
        let mut buffer: Vec<SynopsisRecord> = Vec::new();

        for row in &mut reader {
            // Cooperative cancellation, checked once per input line
            if self.abort.load(Ordering::Relaxed) {
                return Err(ProcessingError::Aborted);
            }
            summary.rows_read += 1;
            match row {
                Ok(hit) => buffer.push(self.normalize(hit)),
                Err(defect) => {
                    summary.rows_dropped += 1;
                    summary.error_log.push(defect.to_string());
                }
            }
        }
        if let Some(err) = reader.error.take() {
            return Err(ReportError::from(err).into());
        }

        let direction = self.schema.score_direction;
        let ranked = rank_by_scan(buffer, direction, self.options.delta_norm_default);

        let mut filtered: Vec<SynopsisRecord> = match self.options.score_threshold {
            Some(threshold) => ranked
                .into_iter()
                .filter(|r| direction.passes(r.hit.primary_score, threshold))
                .collect(),
            None => ranked,
        };
        summary.rows_filtered = summary.rows_read - summary.rows_dropped - filtered.len() as u64;

        // Global confidence sort, best first, with deterministic tie-breaking
        filtered.sort_by(|a, b| {
            direction
                .sort_key(a.hit.primary_score)
                .total_cmp(&direction.sort_key(b.hit.primary_score))
                .then_with(|| a.hit.scan.cmp(&b.hit.scan))
                .then_with(|| a.hit.charge.cmp(&b.hit.charge))
                .then_with(|| a.peptide.cmp(&b.peptide))
        });

        let scored = assign_q_values(assign_fdr(filtered, &self.options.decoy));

        let mut writer = SynopsisWriterType::new(sink, self.schema);
        writer.write_header()?;
        for record in &scored {
            writer.write_record(record)?;
            if let Some(map) = protein_map {
                for expanded in map.expand(record) {
                    writer.write_record(&expanded)?;
                }
            }
        }
        writer.flush()?;
        summary.rows_written = u64::from(writer.records_written());

        // The working set is released before the next file begins
        drop(scored);

        Ok(summary)
    }

    /// Run the pipeline between two paths, transparently decompressing
    /// gzip input
    pub fn process_path(
        &self,
        source: impl AsRef<Path>,
        sink: impl AsRef<Path>,
        protein_map: Option<&PeptideProteinMap>,
    ) -> Result<ProcessingSummary, ProcessingError> {
        let source = open_buffered(source.as_ref())?;
        let sink = fs::File::create(sink.as_ref())?;
        self.process(source, sink, protein_map)
    }

    /// Assemble the normalized record for one accepted hit
    fn normalize(&self, hit: RawHit) -> SynopsisRecord {
        let (body, _prefix, _suffix) = split_flanks(&hit.peptide);
        let body = body.to_string();
        let clean = clean_sequence(&body);

        let parser =
            ModificationParser::new(self.schema.syntax, &self.options.symbolic_modifications);
        let mut modifications = parser.parse(&body);
        snap_to_known_masses(
            &mut modifications,
            &self.options.dynamic_modification_masses,
            self.options.mass_digits,
        );
        modifications.extend(apply_static_modifications(
            &clean,
            &self.options.static_modifications,
        ));

        let modification_total: f64 = modifications.iter().map(|m| m.mass_delta).sum();
        let engine_mass = self.options.residue_masses.peptide_mass(&clean) + modification_total;

        let observed_mass = hit.observed_mass.or_else(|| {
            hit.precursor_mz
                .filter(|mz| *mz > 0.0 && hit.charge > 0)
                .map(|mz| neutral_mass(mz, hit.charge))
        });
        let context = format!("scan {} charge {}", hit.scan, hit.charge);
        let reconciled = reconcile(
            engine_mass,
            hit.tool_mass,
            observed_mass,
            hit.precursor_mz,
            &context,
        );

        SynopsisRecord {
            peptide: body,
            clean_sequence: clean,
            modifications,
            theoretical_mass: reconciled.theoretical_mass,
            mh: reconciled.mh,
            delta_mass: reconciled.delta_mass,
            delta_mass_ppm: reconciled.delta_mass_ppm,
            rank: 0,
            delta_norm_score: 0.0,
            fdr: 0.0,
            q_value: 0.0,
            hit,
        }
    }
}
