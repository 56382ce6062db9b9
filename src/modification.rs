//! Parsing the inline modification annotations search engines embed in
//! their peptide strings, and cross-referencing statically configured
//! modifications against the clean sequence.

use log::debug;

/// Which terminus, if any, a modification is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Terminus {
    #[default]
    None,
    PeptideN,
    PeptideC,
    ProteinN,
    ProteinC,
}

/// One modification resolved to a residue position in the clean sequence
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModificationToken {
    pub residue: char,
    /// 1-based position in the clean sequence
    pub position: usize,
    pub terminus: Terminus,
    pub mass_delta: f64,
}

/// A marker character a search engine writes in place of a fixed mass delta
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolicModification {
    pub symbol: char,
    pub mass_delta: f64,
}

/// A modification applied to every matching residue or terminus by
/// configuration, never written into the annotation text itself
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StaticModification {
    Residue { residue: char, mass_delta: f64 },
    Terminal { terminus: Terminus, mass_delta: f64 },
}

/// The marker characters of a tool's annotation dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModificationSyntax {
    /// Opens an ambiguous modification group
    pub group_open: char,
    /// Closes an ambiguous modification group
    pub group_close: char,
    /// Opens a numeric mass delta token
    pub mass_open: char,
    /// Closes a numeric mass delta token
    pub mass_close: char,
}

impl Default for ModificationSyntax {
    fn default() -> Self {
        Self {
            group_open: '(',
            group_close: ')',
            mass_open: '[',
            mass_close: ']',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Normal,
    InGroup,
    InMassToken { in_group: bool },
}

/// Placeholder residue for tokens that precede the first sequence letter,
/// replaced once the first residue is known
const NO_RESIDUE: char = '-';

/// A single left-to-right scan over a peptide annotation, emitting one
/// [`ModificationToken`] per resolved mass delta.
///
/// Mass tokens enclosed in the group markers resolve to the *first* residue
/// of the group, and a group stays visible to one token immediately
/// following its close marker. A token arriving before any residue letter is
/// coerced to position 1 on the peptide N-terminus.
#[derive(Debug, Clone)]
pub struct ModificationParser<'a> {
    syntax: ModificationSyntax,
    symbolic: &'a [SymbolicModification],
}

impl<'a> ModificationParser<'a> {
    pub fn new(syntax: ModificationSyntax, symbolic: &'a [SymbolicModification]) -> Self {
        Self { syntax, symbolic }
    }

    pub fn parse(&self, annotation: &str) -> Vec<ModificationToken> {
        let mut tokens: Vec<ModificationToken> = Vec::new();
        let mut state = ParserState::Normal;
        let mut most_recent = NO_RESIDUE;
        let mut position = 0usize;
        let mut first_residue: Option<char> = None;
        let mut group_first: Option<(char, usize)> = None;
        let mut clear_group_pending = false;
        let mut buffer = String::new();

        for c in annotation.chars() {
            state = match state {
                ParserState::InMassToken { in_group } => {
                    if c == self.syntax.mass_close {
                        match buffer.parse::<f64>() {
                            Ok(delta) => {
                                tokens.push(resolve(delta, group_first, most_recent, position));
                            }
                            Err(_) => {
                                debug!("dropping unparsable modification mass token {buffer:?}");
                            }
                        }
                        buffer.clear();
                        if clear_group_pending {
                            group_first = None;
                            clear_group_pending = false;
                        }
                        if in_group {
                            ParserState::InGroup
                        } else {
                            ParserState::Normal
                        }
                    } else {
                        buffer.push(c);
                        ParserState::InMassToken { in_group }
                    }
                }
                current => {
                    if c == self.syntax.mass_open {
                        ParserState::InMassToken {
                            in_group: current == ParserState::InGroup,
                        }
                    } else if c == self.syntax.group_open {
                        group_first = None;
                        clear_group_pending = false;
                        ParserState::InGroup
                    } else if c == self.syntax.group_close {
                        // The group residue stays visible to one trailing token
                        clear_group_pending = true;
                        ParserState::Normal
                    } else if c.is_ascii_alphabetic() {
                        if clear_group_pending {
                            group_first = None;
                            clear_group_pending = false;
                        }
                        position += 1;
                        most_recent = c;
                        if first_residue.is_none() {
                            first_residue = Some(c);
                        }
                        if current == ParserState::InGroup && group_first.is_none() {
                            group_first = Some((c, position));
                        }
                        current
                    } else if let Some(sym) = self.symbolic.iter().find(|m| m.symbol == c) {
                        tokens.push(resolve(sym.mass_delta, group_first, most_recent, position));
                        if clear_group_pending {
                            group_first = None;
                            clear_group_pending = false;
                        }
                        current
                    } else {
                        current
                    }
                }
            };
        }

        if matches!(state, ParserState::InMassToken { .. }) && !buffer.is_empty() {
            debug!("discarding unterminated modification mass token {buffer:?}");
        }

        if let Some(first) = first_residue {
            for token in &mut tokens {
                if token.residue == NO_RESIDUE {
                    token.residue = first;
                }
            }
        }
        tokens
    }
}

fn resolve(
    mass_delta: f64,
    group_first: Option<(char, usize)>,
    most_recent: char,
    position: usize,
) -> ModificationToken {
    let (residue, position) = group_first.unwrap_or((most_recent, position));
    if position == 0 {
        ModificationToken {
            residue,
            position: 1,
            terminus: Terminus::PeptideN,
            mass_delta,
        }
    } else {
        ModificationToken {
            residue,
            position,
            terminus: Terminus::None,
            mass_delta,
        }
    }
}

/// Strip a peptide annotation down to its residue letters
pub fn clean_sequence(annotation: &str) -> String {
    annotation.chars().filter(|c| c.is_ascii_alphabetic()).collect()
}

/// Cross-reference configured static modifications against every residue of
/// the clean sequence, independent of the annotation text
pub fn apply_static_modifications(
    clean_sequence: &str,
    definitions: &[StaticModification],
) -> Vec<ModificationToken> {
    let mut tokens = Vec::new();
    let length = clean_sequence.chars().count();
    for definition in definitions {
        match *definition {
            StaticModification::Residue {
                residue,
                mass_delta,
            } => {
                for (i, aa) in clean_sequence.chars().enumerate() {
                    if aa.eq_ignore_ascii_case(&residue) {
                        tokens.push(ModificationToken {
                            residue: aa,
                            position: i + 1,
                            terminus: Terminus::None,
                            mass_delta,
                        });
                    }
                }
            }
            StaticModification::Terminal {
                terminus,
                mass_delta,
            } => {
                let (Some(first), Some(last)) = (
                    clean_sequence.chars().next(),
                    clean_sequence.chars().last(),
                ) else {
                    continue;
                };
                let (position, residue) = match terminus {
                    Terminus::PeptideN | Terminus::ProteinN => (1, first),
                    Terminus::PeptideC | Terminus::ProteinC => (length, last),
                    Terminus::None => continue,
                };
                tokens.push(ModificationToken {
                    residue,
                    position,
                    terminus,
                    mass_delta,
                });
            }
        }
    }
    tokens
}

/// Replace parsed mass deltas with the matching configured modification mass
/// when they agree to the given number of decimal digits
pub fn snap_to_known_masses(tokens: &mut [ModificationToken], known: &[f64], digits: u32) {
    if known.is_empty() {
        return;
    }
    let half_step = 0.5 * 10f64.powi(-(digits as i32));
    for token in tokens {
        if let Some(mass) = known
            .iter()
            .find(|mass| (token.mass_delta - **mass).abs() <= half_step)
        {
            token.mass_delta = *mass;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(annotation: &str) -> Vec<ModificationToken> {
        ModificationParser::new(ModificationSyntax::default(), &[]).parse(annotation)
    }

    #[test]
    fn test_single_numeric_token() {
        let tokens = parse("AC[15.9949]DE");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].residue, 'C');
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[0].terminus, Terminus::None);
        assert!((tokens[0].mass_delta - 15.9949).abs() < 1e-9);
    }

    #[test]
    fn test_n_terminal_token_clamps_to_first_position() {
        let tokens = parse("[229.1629]PEPTIDE");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].position, 1);
        assert_eq!(tokens[0].terminus, Terminus::PeptideN);
        assert_eq!(tokens[0].residue, 'P');
    }

    #[test]
    fn test_group_resolves_to_first_residue() {
        let tokens = parse("A(CD)[79.9663]E");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].residue, 'C');
        assert_eq!(tokens[0].position, 2);

        // A token closing inside the group resolves the same way
        let tokens = parse("A(C[79.9663]D)E");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].residue, 'C');
        assert_eq!(tokens[0].position, 2);
    }

    #[test]
    fn test_group_cleared_after_trailing_token() {
        let tokens = parse("A(CD)[79.9663]E[15.9949]");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].residue, 'C');
        assert_eq!(tokens[1].residue, 'E');
        assert_eq!(tokens[1].position, 4);
    }

    #[test]
    fn test_unparsable_digits_dropped_silently() {
        let tokens = parse("AC[no-mass]DE");
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_unterminated_token_discarded() {
        let tokens = parse("ACDE[15.99");
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_symbolic_modification() {
        let symbolic = [SymbolicModification {
            symbol: '*',
            mass_delta: 15.9949,
        }];
        let tokens =
            ModificationParser::new(ModificationSyntax::default(), &symbolic).parse("ACM*DE");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].residue, 'M');
        assert_eq!(tokens[0].position, 3);
        assert!((tokens[0].mass_delta - 15.9949).abs() < 1e-9);
    }

    #[test]
    fn test_clean_sequence() {
        assert_eq!(clean_sequence("AC[15.9949]DE"), "ACDE");
        assert_eq!(clean_sequence("(QD)[-17.03]ER"), "QDER");
    }

    #[test]
    fn test_static_residue_modifications() {
        let defs = [StaticModification::Residue {
            residue: 'C',
            mass_delta: 57.02146,
        }];
        let tokens = apply_static_modifications("ACDC", &defs);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[1].position, 4);
    }

    #[test]
    fn test_static_terminal_modifications() {
        let defs = [
            StaticModification::Terminal {
                terminus: Terminus::PeptideN,
                mass_delta: 229.1629,
            },
            StaticModification::Terminal {
                terminus: Terminus::PeptideC,
                mass_delta: 14.0157,
            },
        ];
        let tokens = apply_static_modifications("ACDE", &defs);
        assert_eq!(tokens.len(), 2);
        assert_eq!(
            (tokens[0].position, tokens[0].terminus),
            (1, Terminus::PeptideN)
        );
        assert_eq!(
            (tokens[1].position, tokens[1].terminus),
            (4, Terminus::PeptideC)
        );
    }

    #[test]
    fn test_snap_to_known_masses() {
        let mut tokens = parse("AC[15.995]DE");
        snap_to_known_masses(&mut tokens, &[15.9949, 57.02146], 2);
        assert_eq!(tokens[0].mass_delta, 15.9949);

        let mut tokens = parse("AC[42.0]DE");
        snap_to_known_masses(&mut tokens, &[15.9949], 2);
        assert_eq!(tokens[0].mass_delta, 42.0);
    }
}
