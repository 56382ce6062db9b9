//! Decoy-based false discovery rate estimation and monotonic Q-value
//! assignment over the confidence-sorted result buffer.

use std::collections::HashMap;

use regex::Regex;

use crate::hit::SynopsisRecord;

/// The injected decoy-name predicate: a protein whose name matches the
/// pattern counts as a decoy. Reversed-protein tagging conventions differ
/// between search databases, so the pattern is always caller-configurable.
#[derive(Debug, Clone)]
pub struct DecoyMatcher {
    pattern: Regex,
}

impl DecoyMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(|pattern| Self { pattern })
    }

    #[inline]
    pub fn is_decoy(&self, protein: &str) -> bool {
        self.pattern.is_match(protein)
    }
}

impl Default for DecoyMatcher {
    /// Covers the common reversed-protein prefixes. Callers with other
    /// tagging conventions construct their own matcher.
    fn default() -> Self {
        Self::new(r"^(Reversed_|REV_|XXX_|DECOY_)").unwrap()
    }
}

/// The composite identity of one identification. Rows sharing a key map
/// the same identification onto different proteins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HitKey {
    scan: u32,
    charge: i32,
    peptide: String,
}

impl HitKey {
    fn of(record: &SynopsisRecord) -> Self {
        Self {
            scan: record.hit.scan,
            charge: record.hit.charge,
            peptide: record.peptide.clone(),
        }
    }
}

fn same_key(a: &SynopsisRecord, b: &SynopsisRecord) -> bool {
    a.hit.scan == b.hit.scan && a.hit.charge == b.hit.charge && a.peptide == b.peptide
}

/// Walk the confidence-sorted rows (best first), classify each
/// (scan, charge, peptide) group as forward or decoy, and stamp the running
/// FDR estimate onto every row of the group.
///
/// A group is a decoy only when every protein of every row matches the
/// predicate; a single forward protein anywhere makes the whole group
/// forward. A key that reappears later in the file reuses its recorded FDR
/// without recounting.
pub fn assign_fdr(mut records: Vec<SynopsisRecord>, decoy: &DecoyMatcher) -> Vec<SynopsisRecord> {
    let mut forward = 0u64;
    let mut decoys = 0u64;
    let mut seen: HashMap<HitKey, f64> = HashMap::new();

    let mut start = 0;
    while start < records.len() {
        let end = start
            + records[start..]
                .iter()
                .take_while(|r| same_key(&records[start], r))
                .count();
        let key = HitKey::of(&records[start]);
        let fdr = match seen.get(&key) {
            Some(fdr) => *fdr,
            None => {
                let all_decoy = records[start..end].iter().all(|r| {
                    !r.hit.proteins.is_empty()
                        && r.hit.proteins.iter().all(|p| decoy.is_decoy(p))
                });
                if all_decoy {
                    decoys += 1;
                } else {
                    forward += 1;
                }
                let fdr = decoys as f64 / forward.max(1) as f64;
                seen.insert(key, fdr);
                fdr
            }
        };
        for record in &mut records[start..end] {
            record.fdr = fdr;
        }
        start = end;
    }
    records
}

/// Derive Q-values by walking from worst to best confidence, carrying the
/// cumulative minimum FDR. The result is non-increasing as confidence
/// improves, by construction.
pub fn assign_q_values(mut records: Vec<SynopsisRecord>) -> Vec<SynopsisRecord> {
    let mut q_min = 1.0f64;
    for record in records.iter_mut().rev() {
        q_min = q_min.min(record.fdr);
        record.q_value = q_min;
    }
    records
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hit::RawHit;

    fn record(scan: u32, peptide: &str, proteins: &[&str]) -> SynopsisRecord {
        SynopsisRecord {
            hit: RawHit {
                scan,
                charge: 2,
                proteins: proteins.iter().map(|p| p.to_string()).collect(),
                ..Default::default()
            },
            peptide: peptide.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fdr_one_decoy_in_ten() {
        let mut records: Vec<_> = (0..9)
            .map(|i| record(i, "ACDEFGHIK", &["ALBU_HUMAN"]))
            .collect();
        records.push(record(9, "MLKNVAEIR", &["Reversed_ALBU_HUMAN"]));

        let scored = assign_q_values(assign_fdr(records, &DecoyMatcher::default()));
        assert!((scored[9].fdr - 1.0 / 9.0).abs() < 1e-12);
        for record in &scored[..9] {
            assert!(record.q_value <= 1.0 / 9.0 + 1e-12);
        }
    }

    #[test]
    fn test_forward_protein_rescues_group() {
        let records = vec![
            record(1, "ACDEFGHIK", &["Reversed_ALBU_HUMAN"]),
            record(1, "ACDEFGHIK", &["ALBU_HUMAN"]),
        ];
        let scored = assign_fdr(records, &DecoyMatcher::default());
        // The whole group is forward, so no decoys were counted
        assert_eq!(scored[0].fdr, 0.0);
        assert_eq!(scored[1].fdr, 0.0);
    }

    #[test]
    fn test_repeated_key_reuses_recorded_fdr() {
        let records = vec![
            record(1, "ACDEFGHIK", &["ALBU_HUMAN"]),
            record(2, "MLKNVAEIR", &["Reversed_TRYP_PIG"]),
            record(1, "ACDEFGHIK", &["OTHER_PROTEIN"]),
        ];
        let scored = assign_fdr(records, &DecoyMatcher::default());
        // The reappearance of scan 1 reuses the FDR recorded before the
        // decoy was seen, rather than recounting the group
        assert_eq!(scored[2].fdr, scored[0].fdr);
    }

    #[test]
    fn test_q_values_monotonic() {
        let mut records: Vec<_> = (0..20)
            .map(|i| {
                if i % 3 == 2 {
                    record(i, "MLKNVAEIR", &["XXX_DECOY"])
                } else {
                    record(i, "ACDEFGHIK", &["ALBU_HUMAN"])
                }
            })
            .collect();
        records = assign_q_values(assign_fdr(records, &DecoyMatcher::default()));
        for pair in records.windows(2) {
            assert!(pair[0].q_value <= pair[1].q_value);
        }
    }

    #[test]
    fn test_custom_decoy_pattern() {
        let matcher = DecoyMatcher::new(r"^shuffled\.").unwrap();
        assert!(matcher.is_decoy("shuffled.ALBU_HUMAN"));
        assert!(!matcher.is_decoy("Reversed_ALBU_HUMAN"));
    }
}
