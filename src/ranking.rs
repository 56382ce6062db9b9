//! Per-scan ranking and delta-score normalization.

use crate::hit::SynopsisRecord;
use crate::schema::ScoreDirection;

/// Sort the unfiltered buffer by scan, charge and direction-normalized
/// score, then assign 1-based ranks within each scan group and the
/// normalized score gap to the next-ranked hit. Returns a new vector;
/// nothing upstream is mutated in place.
///
/// Ranking runs per scan across all charge states combined, not per
/// charge state within a scan.
pub fn rank_by_scan(
    mut records: Vec<SynopsisRecord>,
    direction: ScoreDirection,
    delta_norm_default: f64,
) -> Vec<SynopsisRecord> {
    records.sort_by(|a, b| {
        a.hit
            .scan
            .cmp(&b.hit.scan)
            .then(a.hit.charge.cmp(&b.hit.charge))
            .then(
                direction
                    .sort_key(a.hit.primary_score)
                    .total_cmp(&direction.sort_key(b.hit.primary_score)),
            )
    });

    let mut start = 0;
    while start < records.len() {
        let scan = records[start].hit.scan;
        let end = start
            + records[start..]
                .iter()
                .take_while(|r| r.hit.scan == scan)
                .count();
        rank_group(&mut records[start..end], direction, delta_norm_default);
        start = end;
    }
    records
}

fn rank_group(group: &mut [SynopsisRecord], direction: ScoreDirection, delta_norm_default: f64) {
    group.sort_by(|a, b| {
        direction
            .sort_key(a.hit.primary_score)
            .total_cmp(&direction.sort_key(b.hit.primary_score))
    });

    let mut rank = 1u32;
    for i in 0..group.len() {
        // Bit-identical scores must share a rank
        if i > 0
            && (group[i].hit.primary_score - group[i - 1].hit.primary_score).abs() > f64::EPSILON
        {
            rank += 1;
        }
        let score = group[i].hit.primary_score;
        let next_score = group.get(i + 1).map(|next| next.hit.primary_score);
        group[i].rank = rank;
        group[i].delta_norm_score = match next_score {
            Some(next) if score != 0.0 => (score - next).abs() / score,
            _ => delta_norm_default,
        };
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hit::RawHit;

    fn record(scan: u32, charge: i32, score: f64) -> SynopsisRecord {
        SynopsisRecord {
            hit: RawHit {
                scan,
                charge,
                primary_score: score,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_ties_share_rank() {
        let records = vec![
            record(100, 2, 10.0),
            record(100, 2, 10.0),
            record(100, 2, 5.0),
        ];
        let ranked = rank_by_scan(records, ScoreDirection::HigherIsBetter, 0.0);
        let ranks: Vec<u32> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 1, 2]);
    }

    #[test]
    fn test_minimum_rank_is_one_per_group() {
        let records = vec![
            record(100, 2, 1e-10),
            record(100, 2, 1e-8),
            record(200, 2, 1e-7),
            record(200, 3, 1e-9),
        ];
        let ranked = rank_by_scan(records, ScoreDirection::LowerIsBetter, 0.0);
        for scan in [100, 200] {
            let min = ranked
                .iter()
                .filter(|r| r.hit.scan == scan)
                .map(|r| r.rank)
                .min()
                .unwrap();
            assert_eq!(min, 1);
        }
    }

    #[test]
    fn test_ranking_spans_charge_states() {
        // One scan, two charge states: still a single ranked group
        let records = vec![record(300, 2, 0.9), record(300, 3, 0.95)];
        let ranked = rank_by_scan(records, ScoreDirection::HigherIsBetter, 0.0);
        assert_eq!(ranked[0].hit.charge, 3);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn test_delta_norm_scores() {
        let records = vec![
            record(100, 2, 10.0),
            record(100, 2, 8.0),
            record(100, 2, 5.0),
        ];
        let ranked = rank_by_scan(records, ScoreDirection::HigherIsBetter, 0.0);
        assert!((ranked[0].delta_norm_score - 0.2).abs() < 1e-12);
        assert!((ranked[1].delta_norm_score - 3.0 / 8.0).abs() < 1e-12);
        // The last row of every group takes the configured default
        assert_eq!(ranked[2].delta_norm_score, 0.0);
        assert!(ranked.iter().all(|r| r.delta_norm_score >= 0.0));
    }

    #[test]
    fn test_zero_score_takes_default() {
        let records = vec![record(100, 2, 0.0), record(100, 2, 0.0)];
        let ranked = rank_by_scan(records, ScoreDirection::HigherIsBetter, 0.0);
        assert_eq!(ranked[0].delta_norm_score, 0.0);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 1);
    }
}
