//! The externally produced peptide-to-protein map, and the expansion of
//! synopsis rows over every protein a peptide maps to.

use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use log::{debug, warn};
use thiserror::Error;

use crate::hit::SynopsisRecord;

/// One row of the peptide-to-protein map
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeptideProteinEntry {
    /// Peptide with modification annotation, the map's sort key
    pub peptide: String,
    pub protein: String,
    /// 1-based first residue of the peptide within the protein
    pub residue_start: u32,
    /// 1-based last residue of the peptide within the protein
    pub residue_end: u32,
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed reading the peptide to protein map: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

/// The peptide→protein index produced by the upstream protein matcher,
/// held fully in memory and sorted by peptide for binary search
#[derive(Debug, Clone, Default)]
pub struct PeptideProteinMap {
    entries: Vec<PeptideProteinEntry>,
}

impl PeptideProteinMap {
    pub fn new(mut entries: Vec<PeptideProteinEntry>) -> Self {
        entries.sort_by(|a, b| {
            a.peptide
                .cmp(&b.peptide)
                .then_with(|| a.protein.cmp(&b.protein))
        });
        Self { entries }
    }

    /// Read the tab-separated (Peptide, Protein, ResidueStart, ResidueEnd)
    /// map. A leading header line is tolerated; malformed lines are skipped.
    pub fn from_reader<R: io::Read>(source: R) -> Result<Self, MapError> {
        let mut entries = Vec::new();
        for (index, line) in io::BufReader::new(source).lines().enumerate() {
            let line = line?;
            let mut fields = line.split('\t');
            let (Some(peptide), Some(protein), start, end) = (
                fields.next(),
                fields.next(),
                fields.next().and_then(|v| v.trim().parse::<u32>().ok()),
                fields.next().and_then(|v| v.trim().parse::<u32>().ok()),
            ) else {
                continue;
            };
            let (Some(residue_start), Some(residue_end)) = (start, end) else {
                if index > 0 {
                    debug!("skipping malformed protein map line {}", index + 1);
                }
                continue;
            };
            entries.push(PeptideProteinEntry {
                peptide: peptide.trim().to_string(),
                protein: protein.trim().to_string(),
                residue_start,
                residue_end,
            });
        }
        Ok(Self::new(entries))
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, MapError> {
        Self::from_reader(fs::File::open(path)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries whose peptide equals `peptide`
    pub fn lookup(&self, peptide: &str) -> &[PeptideProteinEntry] {
        let start = self
            .entries
            .partition_point(|entry| entry.peptide.as_str() < peptide);
        let matched = self.entries[start..]
            .iter()
            .take_while(|entry| entry.peptide == peptide)
            .count();
        &self.entries[start..start + matched]
    }

    /// One additional synopsis row per distinct protein the record's peptide
    /// maps to beyond its own primary protein. A peptide missing from the
    /// map is surfaced as a warning, not an error: upstream protein matching
    /// can legitimately miss non-canonical sequence variants.
    pub fn expand(&self, record: &SynopsisRecord) -> Vec<SynopsisRecord> {
        let matches = self.lookup(&record.peptide);
        if matches.is_empty() {
            warn!(
                "no match for peptide {:?} in the protein map",
                record.peptide
            );
            return Vec::new();
        }
        let mut seen = vec![record.hit.primary_protein().to_string()];
        let mut expanded = Vec::new();
        for entry in matches {
            if seen.contains(&entry.protein) {
                continue;
            }
            let mut row = record.clone();
            row.hit.proteins = vec![entry.protein.clone()];
            expanded.push(row);
            seen.push(entry.protein.clone());
        }
        expanded
    }
}
