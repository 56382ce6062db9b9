//! The record types flowing through the pipeline, and the small text
//! extractions needed to assemble them from raw report columns.

use std::sync::OnceLock;

use regex::Regex;

use crate::modification::ModificationToken;

/// One parsed line of search engine output, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawHit {
    pub scan: u32,
    pub charge: i32,
    /// The peptide annotation exactly as the tool wrote it
    pub peptide: String,
    pub proteins: Vec<String>,
    pub primary_score: f64,
    pub secondary_score: f64,
    /// The tool's own theoretical mass; absent or zero means it must be derived
    pub tool_mass: Option<f64>,
    pub observed_mass: Option<f64>,
    pub precursor_mz: Option<f64>,
    /// 1-based input line the hit came from
    pub line_index: u64,
}

impl RawHit {
    /// The first protein reference on the row
    pub fn primary_protein(&self) -> &str {
        self.proteins.first().map(String::as_str).unwrap_or("")
    }
}

/// A fully normalized synopsis row. Built once per accepted hit; the
/// rank, delta-norm, FDR and Q-value fields are filled by the later
/// whole-buffer passes.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SynopsisRecord {
    pub hit: RawHit,
    /// The annotation with flanking residues stripped, modifications intact
    pub peptide: String,
    /// Residue letters only
    pub clean_sequence: String,
    pub modifications: Vec<ModificationToken>,
    pub theoretical_mass: f64,
    /// (M+H)⁺ of the computed theoretical mass
    pub mh: f64,
    pub delta_mass: f64,
    pub delta_mass_ppm: f64,
    /// 1-based rank within the scan group, ties share a rank
    pub rank: u32,
    pub delta_norm_score: f64,
    pub fdr: f64,
    pub q_value: f64,
}

/// Split `K.PEPTIDER.S` style flanking residues off a peptide annotation.
/// Either flank may be `-`, marking a protein terminus. Annotations without
/// flank separators pass through unchanged.
pub fn split_flanks(annotation: &str) -> (&str, Option<char>, Option<char>) {
    fn is_flank(b: u8) -> bool {
        b.is_ascii_alphabetic() || b == b'-'
    }

    let bytes = annotation.as_bytes();
    let mut start = 0;
    let mut end = bytes.len();
    let mut prefix = None;
    let mut suffix = None;
    if bytes.len() >= 2 && bytes[1] == b'.' && is_flank(bytes[0]) {
        prefix = Some(bytes[0] as char);
        start = 2;
    }
    if end >= start + 2 && bytes[end - 2] == b'.' && is_flank(bytes[end - 1]) {
        suffix = Some(bytes[end - 1] as char);
        end -= 2;
    }
    (&annotation[start..end], prefix, suffix)
}

/// Extract a scan number from a scan column token, which may be a plain
/// integer, a `scan=1234` pair, or a scan list like `1234-1236`. The first
/// number wins.
pub fn extract_scan(text: &str) -> Option<u32> {
    static SCAN: OnceLock<Regex> = OnceLock::new();
    let pattern = SCAN.get_or_init(|| Regex::new(r"(\d+)").unwrap());
    pattern.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Split a protein reference column into individual names, dropping the
/// flanking-residue context some tools append (`sp|P02768|ALBU_HUMAN(pre=K,post=S)`)
pub fn split_proteins(text: &str) -> Vec<String> {
    text.split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| match name.rfind("(pre=") {
            Some(i) if name.ends_with(')') => name[..i].trim().to_string(),
            _ => name.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split_flanks() {
        assert_eq!(
            split_flanks("K.ACDEFGHIK.R"),
            ("ACDEFGHIK", Some('K'), Some('R'))
        );
        assert_eq!(
            split_flanks("-.M[15.9949]ACDE.K"),
            ("M[15.9949]ACDE", Some('-'), Some('K'))
        );
        assert_eq!(split_flanks("ACDEFGHIK"), ("ACDEFGHIK", None, None));
        // A trailing mass token is not a flank
        assert_eq!(split_flanks("ACDE[15.9]"), ("ACDE[15.9]", None, None));
    }

    #[test]
    fn test_extract_scan() {
        assert_eq!(extract_scan("1234"), Some(1234));
        assert_eq!(extract_scan("scan=1234"), Some(1234));
        assert_eq!(extract_scan("1234-1236"), Some(1234));
        assert_eq!(extract_scan("none"), None);
    }

    #[test]
    fn test_split_proteins() {
        assert_eq!(
            split_proteins("sp|P02768|ALBU_HUMAN(pre=K,post=S);sp|P00761|TRYP_PIG"),
            vec!["sp|P02768|ALBU_HUMAN", "sp|P00761|TRYP_PIG"]
        );
        assert_eq!(split_proteins(""), Vec::<String>::new());
    }
}
