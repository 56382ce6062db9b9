//! Residue mass bookkeeping and reconciliation of computed peptide masses
//! against the masses the search engine reported.

use log::warn;

use crate::mass_error::Tolerance;
use crate::utils::{protonated_mass, WATER};

/// The m/z denominator used for ppm conversion when no observed precursor
/// m/z is available, to keep the division well-defined
pub const PPM_FALLBACK_MZ: f64 = 1000.0;

/// Monoisotopic masses for the twenty standard amino acid residues,
/// with per-residue overrides for non-standard residue definitions.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResidueMasses {
    masses: [f64; 26],
}

impl Default for ResidueMasses {
    fn default() -> Self {
        let mut masses = [0.0; 26];
        for (aa, mass) in [
            (b'G', 57.02146372),
            (b'A', 71.03711378),
            (b'S', 87.03202840),
            (b'P', 97.05276384),
            (b'V', 99.06841390),
            (b'T', 101.04767846),
            (b'C', 103.00918478),
            (b'L', 113.08406396),
            (b'I', 113.08406396),
            (b'N', 114.04292744),
            (b'D', 115.02694302),
            (b'Q', 128.05857750),
            (b'K', 128.09496301),
            (b'E', 129.04259308),
            (b'M', 131.04048508),
            (b'H', 137.05891186),
            (b'F', 147.06841390),
            (b'R', 156.10111102),
            (b'Y', 163.06332852),
            (b'W', 186.07931294),
        ] {
            masses[(aa - b'A') as usize] = mass;
        }
        Self { masses }
    }
}

impl ResidueMasses {
    /// The monoisotopic mass of a single residue, or `None` for letters
    /// without a defined mass (`B`, `J`, `O`, `U`, `X`, `Z`)
    pub fn residue(&self, aa: char) -> Option<f64> {
        let aa = aa.to_ascii_uppercase();
        if !aa.is_ascii_uppercase() {
            return None;
        }
        let mass = self.masses[(aa as u8 - b'A') as usize];
        (mass != 0.0).then_some(mass)
    }

    /// Override the mass of a residue letter
    pub fn set_residue(&mut self, aa: char, mass: f64) {
        let aa = aa.to_ascii_uppercase();
        if aa.is_ascii_uppercase() {
            self.masses[(aa as u8 - b'A') as usize] = mass;
        }
    }

    /// The monoisotopic mass of an unmodified peptide: the sum of its
    /// residue masses plus one water. Letters without a defined mass
    /// contribute nothing.
    pub fn peptide_mass(&self, clean_sequence: &str) -> f64 {
        clean_sequence
            .chars()
            .filter_map(|aa| self.residue(aa))
            .sum::<f64>()
            + WATER
    }
}

/// The mass error fields derived for one identification
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MassReconciliation {
    /// The engine-computed theoretical monoisotopic mass, modifications included
    pub theoretical_mass: f64,
    /// (M+H)⁺ of the engine-computed mass
    pub mh: f64,
    /// Observed minus theoretical precursor mass, in daltons
    pub delta_mass: f64,
    /// `delta_mass` expressed in parts-per-million of the observed precursor m/z
    pub delta_mass_ppm: f64,
}

/// Derive the mass error fields for one identification.
///
/// When the search engine reported its own non-zero theoretical mass that
/// value is authoritative for the delta computation, but a disagreement with
/// the engine-computed mass beyond `max(0.1 Da, 20 ppm)` is surfaced as a
/// warning. The row is never rejected for a mass discrepancy.
pub fn reconcile(
    engine_mass: f64,
    tool_mass: Option<f64>,
    observed_mass: Option<f64>,
    observed_mz: Option<f64>,
    context: &str,
) -> MassReconciliation {
    let authoritative = match tool_mass {
        Some(mass) if mass > 0.0 => {
            let bound = Tolerance::Da(0.1f64.max(mass / 50000.0));
            if !bound.contains(engine_mass, mass) {
                warn!(
                    "{context}: computed mass {engine_mass:.4} disagrees with reported mass {mass:.4} by {:.4} Da",
                    engine_mass - mass
                );
            }
            mass
        }
        _ => engine_mass,
    };

    let delta_mass = observed_mass.map_or(0.0, |observed| observed - authoritative);
    let denominator = match observed_mz {
        Some(mz) if mz > 0.0 => mz,
        _ => PPM_FALLBACK_MZ,
    };

    MassReconciliation {
        theoretical_mass: engine_mass,
        mh: protonated_mass(engine_mass),
        delta_mass,
        delta_mass_ppm: delta_mass / denominator * 1e6,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::PROTON;

    #[test]
    fn test_peptide_mass() {
        let masses = ResidueMasses::default();
        // Residues plus water, independent of the supplying format
        let expected = 71.03711378
            + 103.00918478
            + 115.02694302
            + 129.04259308
            + 147.06841390
            + 57.02146372
            + 137.05891186
            + 113.08406396
            + 128.09496301
            + WATER;
        assert!((masses.peptide_mass("ACDEFGHIK") - expected).abs() < 1e-9);
    }

    #[test]
    fn test_residue_override() {
        let mut masses = ResidueMasses::default();
        assert!(masses.residue('X').is_none());
        masses.set_residue('X', 100.0);
        assert_eq!(masses.residue('X'), Some(100.0));
    }

    #[test]
    fn test_reconcile_tool_mass_authoritative() {
        let recon = reconcile(1000.0, Some(1000.5), Some(1001.0), Some(501.0), "scan 1");
        assert!((recon.delta_mass - 0.5).abs() < 1e-9);
        assert!((recon.mh - (1000.0 + PROTON)).abs() < 1e-9);
        assert!((recon.delta_mass_ppm - 0.5 / 501.0 * 1e6).abs() < 1e-6);
    }

    #[test]
    fn test_reconcile_fallback_denominator() {
        let recon = reconcile(1000.0, None, Some(1000.1), None, "scan 2");
        assert!((recon.delta_mass - 0.1).abs() < 1e-9);
        assert!((recon.delta_mass_ppm - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_reconcile_no_observed_mass() {
        let recon = reconcile(1000.0, None, None, None, "scan 3");
        assert_eq!(recon.delta_mass, 0.0);
        assert_eq!(recon.delta_mass_ppm, 0.0);
    }

    #[test_log::test]
    fn test_reconcile_discrepancy_warns_but_keeps_the_row() {
        // The disagreement is far past max(0.1 Da, 20 ppm); the row still
        // gets its fields, with the reported mass staying authoritative
        let recon = reconcile(1000.0, Some(1001.0), Some(1001.2), Some(501.6), "scan 4");
        assert!((recon.delta_mass - 0.2).abs() < 1e-9);
        assert!((recon.theoretical_mass - 1000.0).abs() < 1e-9);
    }
}
