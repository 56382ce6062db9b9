//! Tool schema descriptors and header-driven column mapping.
//!
//! Every supported search engine report layout is described by an immutable
//! [`ToolSchema`] value rather than a dedicated reader type. The descriptor
//! carries the recognized header names per semantic field (with aliases
//! covering older versions of a tool's layout), the positional fallback for
//! files that omit their header, and the direction of the tool's primary
//! score.

use indexmap::IndexMap;
use log::warn;
use thiserror::Error;

use crate::modification::ModificationSyntax;

/// The semantic fields a synopsis row is assembled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SynopsisField {
    ResultId,
    Scan,
    Charge,
    PrecursorMz,
    ObservedMass,
    ToolMass,
    DeltaMass,
    DeltaMassPpm,
    MH,
    Peptide,
    Protein,
    PrimaryScore,
    SecondaryScore,
    Rank,
    DeltaNormScore,
    Fdr,
    QValue,
}

impl SynopsisField {
    pub const COUNT: usize = 17;

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// Whether smaller or larger primary scores indicate more confident
/// identifications. p-value and e-value like metrics are
/// [`ScoreDirection::LowerIsBetter`], probability and match-score like
/// metrics are [`ScoreDirection::HigherIsBetter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScoreDirection {
    LowerIsBetter,
    HigherIsBetter,
}

impl ScoreDirection {
    /// A key that sorts ascending from most to least confident
    #[inline]
    pub fn sort_key(&self, score: f64) -> f64 {
        match self {
            Self::LowerIsBetter => score,
            Self::HigherIsBetter => -score,
        }
    }

    /// Whether `score` passes a keep-threshold in this direction
    #[inline]
    pub fn passes(&self, score: f64, threshold: f64) -> bool {
        match self {
            Self::LowerIsBetter => score <= threshold,
            Self::HigherIsBetter => score >= threshold,
        }
    }
}

/// An immutable description of one tool family's report layout.
/// Each supported tool is a configuration value of this type, not a subtype.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub tool: &'static str,
    /// Recognized header names per semantic field. The first name is the
    /// canonical one, later names cover older versions of the layout.
    pub aliases: &'static [(SynopsisField, &'static [&'static str])],
    /// Fields a row cannot be assembled without
    pub required: &'static [SynopsisField],
    /// Positional fallback applied when the file carries no header line
    pub default_order: &'static [Option<SynopsisField>],
    /// The fewest tab-separated columns a data line may carry
    pub min_columns: usize,
    pub score_direction: ScoreDirection,
    /// Header of the primary score column in synopsis output
    pub primary_score_name: &'static str,
    /// Header of the secondary score column in synopsis output, if any
    pub secondary_score_name: Option<&'static str>,
    /// Marker characters of the tool's modification annotation dialect
    pub syntax: ModificationSyntax,
}

/// A fatal mismatch between a file and the schema expected of it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{tool} report is missing the required {field:?} column")]
    MissingColumn {
        field: SynopsisField,
        tool: &'static str,
    },
}

/// A resolved mapping from semantic fields to column positions for one file
#[derive(Debug, Clone)]
pub struct ColumnMap {
    fields: [Option<usize>; SynopsisField::COUNT],
    header: IndexMap<String, usize>,
    pub has_header: bool,
}

impl ColumnMap {
    /// Heuristic for files that omit their header line: a line whose second
    /// token parses as a number is data, not a header
    pub fn line_is_data(line: &str) -> bool {
        line.split('\t')
            .nth(1)
            .is_some_and(|token| token.trim().parse::<f64>().is_ok())
    }

    /// Map a header line onto semantic fields. Unrecognized names are
    /// tolerated and logged so schema drift stays observable without
    /// aborting the run; a missing required field is fatal.
    pub fn from_header(schema: &ToolSchema, line: &str) -> Result<Self, SchemaError> {
        let mut fields = [None; SynopsisField::COUNT];
        let mut header = IndexMap::new();
        for (position, token) in line.split('\t').enumerate() {
            let name = token.trim();
            if name.is_empty() {
                continue;
            }
            header.insert(name.to_string(), position);
            let recognized = schema.aliases.iter().find(|(_, names)| {
                names.iter().any(|known| known.eq_ignore_ascii_case(name))
            });
            match recognized {
                Some((field, _)) => {
                    let slot = &mut fields[field.index()];
                    if slot.is_none() {
                        *slot = Some(position);
                    }
                }
                None => {
                    warn!(
                        "{}: unrecognized column {name:?} at position {position}",
                        schema.tool
                    );
                }
            }
        }
        Self::check_required(schema, fields).map(|fields| Self {
            fields,
            header,
            has_header: true,
        })
    }

    /// The version-appropriate positional mapping for headerless files
    pub fn positional(schema: &ToolSchema) -> Result<Self, SchemaError> {
        let mut fields = [None; SynopsisField::COUNT];
        for (position, field) in schema.default_order.iter().enumerate() {
            if let Some(field) = field {
                fields[field.index()] = Some(position);
            }
        }
        Self::check_required(schema, fields).map(|fields| Self {
            fields,
            header: IndexMap::new(),
            has_header: false,
        })
    }

    /// Resolve the first line of a file: either consume it as a header, or
    /// fall back to the positional default and treat the line as data.
    /// Returns the map and whether the line was consumed as a header.
    pub fn detect(schema: &ToolSchema, first_line: &str) -> Result<(Self, bool), SchemaError> {
        if Self::line_is_data(first_line) {
            Self::positional(schema).map(|map| (map, false))
        } else {
            Self::from_header(schema, first_line).map(|map| (map, true))
        }
    }

    fn check_required(
        schema: &ToolSchema,
        fields: [Option<usize>; SynopsisField::COUNT],
    ) -> Result<[Option<usize>; SynopsisField::COUNT], SchemaError> {
        for field in schema.required {
            if fields[field.index()].is_none() {
                return Err(SchemaError::MissingColumn {
                    field: *field,
                    tool: schema.tool,
                });
            }
        }
        Ok(fields)
    }

    #[inline]
    pub fn get(&self, field: SynopsisField) -> Option<usize> {
        self.fields[field.index()]
    }

    /// The header names seen in the file, in file order
    pub fn header(&self) -> impl Iterator<Item = (&str, usize)> {
        self.header
            .iter()
            .map(|(name, position)| (name.as_str(), *position))
    }
}

const BRACKET_SYNTAX: ModificationSyntax = ModificationSyntax {
    group_open: '(',
    group_close: ')',
    mass_open: '[',
    mass_close: ']',
};

/// MSGF+ tab-separated reports. The older MSGF-DB era column names
/// (`SpecProb`, `PValue`, `FDR`) are carried as aliases so both
/// generations of the layout resolve to the same fields.
pub static MSGF_PLUS: ToolSchema = ToolSchema {
    tool: "MSGF+",
    aliases: &[
        (SynopsisField::Scan, &["ScanNum", "Scan#", "Scan"]),
        (SynopsisField::Charge, &["Charge"]),
        (SynopsisField::PrecursorMz, &["Precursor", "PrecursorMZ"]),
        (SynopsisField::Peptide, &["Peptide", "Annotation"]),
        (SynopsisField::Protein, &["Protein"]),
        (
            SynopsisField::PrimaryScore,
            &[
                "SpecEValue",
                "SpecProb",
                "MSGFDB_SpecEValue",
                "MSGFDB_SpecProb",
            ],
        ),
        (SynopsisField::SecondaryScore, &["EValue", "PValue"]),
        (SynopsisField::QValue, &["QValue", "FDR", "EFDR"]),
    ],
    required: &[
        SynopsisField::Scan,
        SynopsisField::Charge,
        SynopsisField::Peptide,
        SynopsisField::Protein,
        SynopsisField::PrimaryScore,
    ],
    default_order: &[
        None,
        None,
        Some(SynopsisField::Scan),
        None,
        Some(SynopsisField::PrecursorMz),
        None,
        None,
        Some(SynopsisField::Charge),
        Some(SynopsisField::Peptide),
        Some(SynopsisField::Protein),
        None,
        None,
        Some(SynopsisField::PrimaryScore),
        Some(SynopsisField::SecondaryScore),
    ],
    min_columns: 14,
    score_direction: ScoreDirection::LowerIsBetter,
    primary_score_name: "SpecEValue",
    secondary_score_name: Some("EValue"),
    syntax: BRACKET_SYNTAX,
};

/// MODa tab-separated reports
pub static MODA: ToolSchema = ToolSchema {
    tool: "MODa",
    aliases: &[
        (SynopsisField::Scan, &["ScanNumber", "Scan", "Index"]),
        (SynopsisField::Charge, &["Charge"]),
        (
            SynopsisField::ObservedMass,
            &["ObservedMonoMass", "ObservedMW"],
        ),
        (
            SynopsisField::ToolMass,
            &["CalculatedMonoMass", "CalculatedMW"],
        ),
        (SynopsisField::Peptide, &["Peptide"]),
        (SynopsisField::Protein, &["Protein"]),
        (SynopsisField::PrimaryScore, &["Probability"]),
        (SynopsisField::SecondaryScore, &["Score", "ModaScore"]),
    ],
    required: &[
        SynopsisField::Scan,
        SynopsisField::Charge,
        SynopsisField::Peptide,
        SynopsisField::Protein,
        SynopsisField::PrimaryScore,
    ],
    default_order: &[
        None,
        Some(SynopsisField::Scan),
        Some(SynopsisField::ObservedMass),
        Some(SynopsisField::Charge),
        Some(SynopsisField::ToolMass),
        None,
        Some(SynopsisField::SecondaryScore),
        Some(SynopsisField::PrimaryScore),
        Some(SynopsisField::Peptide),
        Some(SynopsisField::Protein),
        None,
    ],
    min_columns: 10,
    score_direction: ScoreDirection::HigherIsBetter,
    primary_score_name: "Probability",
    secondary_score_name: Some("Score"),
    syntax: BRACKET_SYNTAX,
};

/// MODPlus tab-separated reports, which share MODa's general shape but
/// order a few columns differently and always carry a header
pub static MODPLUS: ToolSchema = ToolSchema {
    tool: "MODPlus",
    aliases: &[
        (SynopsisField::Scan, &["ScanNumber", "Scan", "Index"]),
        (SynopsisField::Charge, &["Charge"]),
        (
            SynopsisField::ObservedMass,
            &["ObservedMonoMass", "ObservedMW"],
        ),
        (
            SynopsisField::ToolMass,
            &["CalculatedMonoMass", "CalculatedMW"],
        ),
        (SynopsisField::Peptide, &["Peptide"]),
        (SynopsisField::Protein, &["Protein", "ProteinList"]),
        (SynopsisField::PrimaryScore, &["Probability"]),
        (SynopsisField::SecondaryScore, &["Score", "ModPlusScore"]),
    ],
    required: &[
        SynopsisField::Scan,
        SynopsisField::Charge,
        SynopsisField::Peptide,
        SynopsisField::Protein,
        SynopsisField::PrimaryScore,
    ],
    default_order: &[
        None,
        Some(SynopsisField::Scan),
        Some(SynopsisField::ObservedMass),
        Some(SynopsisField::Charge),
        Some(SynopsisField::ToolMass),
        None,
        Some(SynopsisField::SecondaryScore),
        Some(SynopsisField::PrimaryScore),
        Some(SynopsisField::Peptide),
        Some(SynopsisField::Protein),
    ],
    min_columns: 10,
    score_direction: ScoreDirection::HigherIsBetter,
    primary_score_name: "Probability",
    secondary_score_name: Some("Score"),
    syntax: BRACKET_SYNTAX,
};

/// The synopsis format itself, so synopsis output re-reads through the same
/// adapter. Score column aliases cover each tool family's canonical names.
pub static SYNOPSIS: ToolSchema = ToolSchema {
    tool: "Synopsis",
    aliases: &[
        (SynopsisField::ResultId, &["ResultID"]),
        (SynopsisField::Scan, &["Scan"]),
        (SynopsisField::Charge, &["Charge"]),
        (SynopsisField::PrecursorMz, &["PrecursorMZ"]),
        (SynopsisField::DeltaMass, &["DelM"]),
        (SynopsisField::DeltaMassPpm, &["DelM_PPM"]),
        (SynopsisField::MH, &["MH"]),
        (SynopsisField::Peptide, &["Peptide"]),
        (SynopsisField::Protein, &["Protein"]),
        (
            SynopsisField::PrimaryScore,
            &["SpecEValue", "Probability", "SpecProb"],
        ),
        (
            SynopsisField::SecondaryScore,
            &["EValue", "Score", "PValue"],
        ),
        (
            SynopsisField::Rank,
            &["Rank_SpecEValue", "Rank_Probability", "Rank_SpecProb"],
        ),
        (
            SynopsisField::DeltaNormScore,
            &["DeltaNorm_SpecEValue", "DeltaNorm_Probability"],
        ),
        (SynopsisField::Fdr, &["FDR"]),
        (SynopsisField::QValue, &["QValue"]),
    ],
    required: &[
        SynopsisField::Scan,
        SynopsisField::Charge,
        SynopsisField::Peptide,
        SynopsisField::Protein,
        SynopsisField::PrimaryScore,
    ],
    default_order: &[
        Some(SynopsisField::ResultId),
        Some(SynopsisField::Scan),
        Some(SynopsisField::Charge),
        Some(SynopsisField::PrecursorMz),
        Some(SynopsisField::DeltaMass),
        Some(SynopsisField::DeltaMassPpm),
        Some(SynopsisField::MH),
        Some(SynopsisField::Peptide),
        Some(SynopsisField::Protein),
        Some(SynopsisField::PrimaryScore),
        Some(SynopsisField::Rank),
        Some(SynopsisField::DeltaNormScore),
        Some(SynopsisField::SecondaryScore),
        Some(SynopsisField::Fdr),
        Some(SynopsisField::QValue),
    ],
    min_columns: 13,
    score_direction: ScoreDirection::LowerIsBetter,
    primary_score_name: "SpecEValue",
    secondary_score_name: Some("EValue"),
    syntax: BRACKET_SYNTAX,
};

/// All built-in tool descriptors
pub fn known_tools() -> [&'static ToolSchema; 4] {
    [&MSGF_PLUS, &MODA, &MODPLUS, &SYNOPSIS]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header_mapping_current_names() {
        let header = "#SpecFile\tSpecID\tScanNum\tFragMethod\tPrecursor\tIsotopeError\tPrecursorError(ppm)\tCharge\tPeptide\tProtein\tDeNovoScore\tMSGFScore\tSpecEValue\tEValue";
        let map = ColumnMap::from_header(&MSGF_PLUS, header).unwrap();
        assert!(map.has_header);
        assert_eq!(map.get(SynopsisField::Scan), Some(2));
        assert_eq!(map.get(SynopsisField::Charge), Some(7));
        assert_eq!(map.get(SynopsisField::PrimaryScore), Some(12));
        assert_eq!(map.get(SynopsisField::SecondaryScore), Some(13));
        // Unrecognized columns map to nothing rather than failing
        assert_eq!(map.get(SynopsisField::ToolMass), None);
    }

    #[test]
    fn test_header_mapping_tolerates_version_drift() {
        let header = "#SpecFile\tSpecIndex\tScan#\tFragMethod\tPrecursor\tPMError(Da)\tCharge\tPeptide\tProtein\tDeNovoScore\tMSGFScore\tSpecProb\tPValue\tFDR\tPepFDR";
        let map = ColumnMap::from_header(&MSGF_PLUS, header).unwrap();
        assert_eq!(map.get(SynopsisField::Scan), Some(2));
        assert_eq!(map.get(SynopsisField::PrimaryScore), Some(11));
        assert_eq!(map.get(SynopsisField::SecondaryScore), Some(12));
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let header = "#SpecFile\tScanNum\tCharge\tProtein\tSpecEValue";
        let err = ColumnMap::from_header(&MSGF_PLUS, header).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumn {
                field: SynopsisField::Peptide,
                tool: "MSGF+",
            }
        );
    }

    #[test]
    fn test_headerless_detection() {
        let data = "spectra.mzML\t1723\t1723\tCID\t755.41\t0\t1.2\t2\tK.ACDEFGHIK.R\tALBU_HUMAN\t88\t77\t1.2e-10\t4.5e-6";
        assert!(ColumnMap::line_is_data(data));
        let (map, consumed) = ColumnMap::detect(&MSGF_PLUS, data).unwrap();
        assert!(!consumed && !map.has_header);
        assert_eq!(map.get(SynopsisField::Scan), Some(2));
        assert_eq!(map.get(SynopsisField::Peptide), Some(8));

        let header = "#SpecFile\tSpecID\tScanNum\tFragMethod\tPrecursor\tIsotopeError\tPrecursorError(ppm)\tCharge\tPeptide\tProtein\tDeNovoScore\tMSGFScore\tSpecEValue\tEValue";
        let (map, consumed) = ColumnMap::detect(&MSGF_PLUS, header).unwrap();
        assert!(consumed && map.has_header);
    }

    #[test]
    fn test_score_direction() {
        assert!(ScoreDirection::LowerIsBetter.passes(1e-12, 1e-10));
        assert!(!ScoreDirection::LowerIsBetter.passes(1e-8, 1e-10));
        assert!(ScoreDirection::HigherIsBetter.passes(0.99, 0.95));
        assert!(ScoreDirection::HigherIsBetter.sort_key(0.99) < ScoreDirection::HigherIsBetter.sort_key(0.05));
    }

    #[test]
    fn test_known_tools_are_internally_consistent() {
        for schema in known_tools() {
            for field in schema.required {
                assert!(
                    schema
                        .aliases
                        .iter()
                        .any(|(aliased, names)| aliased == field && !names.is_empty()),
                    "{}: required field {field:?} has no alias",
                    schema.tool
                );
            }
            assert!(schema.min_columns <= schema.default_order.len() + 2);
        }
    }
}
