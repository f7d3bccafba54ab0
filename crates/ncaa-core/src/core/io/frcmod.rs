use crate::core::forcefield::params::{
    AngleParams, AtomTypeParams, BondParams, BondedParameterSet, DihedralParams, DihedralTerm,
    LennardJones, PeriodicImproperParams,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum FrcmodError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Title,
    Mass,
    Bond,
    Angle,
    Dihedral,
    Improper,
    Nonbond,
    Skipped,
    None,
}

impl Section {
    fn from_header(line: &str) -> Option<Self> {
        match line.trim() {
            "MASS" => Some(Self::Mass),
            "BOND" => Some(Self::Bond),
            "ANGL" | "ANGLE" => Some(Self::Angle),
            "DIHE" | "DIHEDRAL" => Some(Self::Dihedral),
            "IMPR" | "IMPROPER" => Some(Self::Improper),
            "NONB" | "NONBON" => Some(Self::Nonbond),
            "HBON" | "HBOND" | "CMAP" | "IPOL" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// Splits a `A-B-C` type field off the front of a record.
///
/// Type names may be space padded (`"X -c3-c3-X "`); the last name ends at the first
/// whitespace after the final separator.
fn split_types(line: &str, count: usize, line_num: usize) -> Result<(Vec<String>, &str), FrcmodError> {
    let malformed = || FrcmodError::Parse {
        line: line_num,
        message: format!("expected {count} atom types separated by '-'"),
    };

    let mut parts = line.trim_start().splitn(count, '-');
    let mut names = Vec::with_capacity(count);
    for _ in 0..count - 1 {
        let name = parts.next().ok_or_else(malformed)?.trim();
        if name.is_empty() {
            return Err(malformed());
        }
        names.push(name.to_string());
    }
    let rest = parts.next().ok_or_else(malformed)?.trim_start();
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    if end == 0 {
        return Err(malformed());
    }
    names.push(rest[..end].to_string());
    Ok((names, &rest[end..]))
}

/// Parses `count` leading numbers from `rest`; whatever follows is the comment.
fn take_numbers(rest: &str, count: usize, line_num: usize) -> Result<(Vec<f64>, String), FrcmodError> {
    let mut tokens = rest.split_whitespace();
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let token = tokens.next().ok_or_else(|| FrcmodError::Parse {
            line: line_num,
            message: format!("expected {count} numeric fields"),
        })?;
        values.push(token.parse::<f64>().map_err(|_| FrcmodError::Parse {
            line: line_num,
            message: format!("invalid number '{token}'"),
        })?);
    }
    Ok((values, tokens.collect::<Vec<_>>().join(" ")))
}

fn join_types(types: &[String]) -> String {
    types
        .iter()
        .map(|t| format!("{t:<2}"))
        .collect::<Vec<_>>()
        .join("-")
}

fn with_comment(line: String, comment: &str) -> String {
    if comment.is_empty() {
        line
    } else {
        format!("{line}  {comment}")
    }
}

/// Amber force field modification (frcmod) files.
pub struct FrcmodFile;

impl FrcmodFile {
    pub fn read_from(reader: &mut impl BufRead) -> Result<BondedParameterSet, FrcmodError> {
        let mut set = BondedParameterSet::new();
        let mut section = Section::Title;
        let mut open_dihedral: Option<Vec<String>> = None;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_num = idx + 1;

            if section == Section::Title {
                set.title = line.trim().to_string();
                section = Section::None;
                continue;
            }
            if line.trim().is_empty() {
                section = Section::None;
                open_dihedral = None;
                continue;
            }
            if section == Section::None {
                if let Some(next) = Section::from_header(&line) {
                    section = next;
                    continue;
                }
                if line.trim() == "END" {
                    break;
                }
                return Err(FrcmodError::Parse {
                    line: line_num,
                    message: format!("unexpected line outside of a section: '{}'", line.trim()),
                });
            }

            match section {
                Section::Mass => {
                    let mut tokens = line.split_whitespace();
                    let atom_type = tokens.next().unwrap_or_default().to_string();
                    let rest: Vec<&str> = tokens.collect();
                    let (values, comment) = take_numbers(&rest.join(" "), 1, line_num)?;
                    let mut comment_tokens = comment.split_whitespace();
                    let polarizability = comment
                        .split_whitespace()
                        .next()
                        .and_then(|t| t.parse::<f64>().ok());
                    if polarizability.is_some() {
                        comment_tokens.next();
                    }
                    let entry = AtomTypeParams {
                        mass: Some(values[0]),
                        polarizability,
                        comment: comment_tokens.collect::<Vec<_>>().join(" "),
                        ..set.atom_types.get(&[&atom_type]).cloned().unwrap_or_default()
                    };
                    set.atom_types.insert(&[atom_type], entry);
                }
                Section::Bond => {
                    let (types, rest) = split_types(&line, 2, line_num)?;
                    let (v, comment) = take_numbers(rest, 2, line_num)?;
                    set.bonds.insert(
                        types.as_slice(),
                        BondParams {
                            force_constant: v[0],
                            equilibrium_length: v[1],
                            comment,
                        },
                    );
                }
                Section::Angle => {
                    let (types, rest) = split_types(&line, 3, line_num)?;
                    let (v, comment) = take_numbers(rest, 2, line_num)?;
                    set.angles.insert(
                        types.as_slice(),
                        AngleParams {
                            force_constant: v[0],
                            equilibrium_angle: v[1],
                            comment,
                        },
                    );
                }
                Section::Dihedral => {
                    let (types, rest) = split_types(&line, 4, line_num)?;
                    let (v, comment) = take_numbers(rest, 4, line_num)?;
                    let term = DihedralTerm {
                        divider: v[0],
                        barrier: v[1],
                        phase: v[2],
                        periodicity: v[3].abs(),
                        comment,
                    };
                    let continues = v[3] < 0.0;

                    let extends_open = open_dihedral.as_ref().is_some_and(|open| {
                        let reversed: Vec<String> = types.iter().rev().cloned().collect();
                        *open == types || *open == reversed
                    });
                    match set.dihedrals.get_mut(types.as_slice()).filter(|_| extends_open) {
                        Some(existing) => existing.terms.push(term),
                        None => {
                            set.dihedrals
                                .insert(types.as_slice(), DihedralParams { terms: vec![term] });
                        }
                    }
                    open_dihedral = continues.then_some(types);
                }
                Section::Improper => {
                    let (types, rest) = split_types(&line, 4, line_num)?;
                    let (v, comment) = take_numbers(rest, 3, line_num)?;
                    set.periodic_impropers.insert(
                        types.as_slice(),
                        PeriodicImproperParams {
                            barrier: v[0],
                            phase: v[1],
                            periodicity: v[2],
                            comment,
                        },
                    );
                }
                Section::Nonbond => {
                    let mut tokens = line.split_whitespace();
                    let atom_type = tokens.next().unwrap_or_default().to_string();
                    let rest: Vec<&str> = tokens.collect();
                    let (v, comment) = take_numbers(&rest.join(" "), 2, line_num)?;
                    let mut entry = set
                        .atom_types
                        .get(&[&atom_type])
                        .cloned()
                        .unwrap_or_default();
                    entry.lennard_jones = Some(LennardJones {
                        radius: v[0],
                        well_depth: v[1],
                    });
                    if entry.comment.is_empty() {
                        entry.comment = comment;
                    }
                    set.atom_types.insert(&[atom_type], entry);
                }
                Section::Skipped | Section::Title | Section::None => {}
            }
        }

        Ok(set)
    }

    pub fn write_to(set: &BondedParameterSet, writer: &mut impl Write) -> Result<(), FrcmodError> {
        let title = if set.title.is_empty() {
            "Remark line goes here"
        } else {
            set.title.as_str()
        };
        writeln!(writer, "{}", title)?;

        writeln!(writer, "MASS")?;
        for (key, params) in set.atom_types.iter() {
            let Some(mass) = params.mass else { continue };
            let mut line = format!("{:<2} {:>14.8}", key[0], mass);
            if let Some(polarizability) = params.polarizability {
                line.push_str(&format!(" {:>14.8}", polarizability));
            }
            writeln!(writer, "{}", with_comment(line, &params.comment))?;
        }
        writeln!(writer)?;

        writeln!(writer, "BOND")?;
        for (key, p) in set.bonds.iter() {
            let line = format!(
                "{}  {:>14.8}  {:>14.8}",
                join_types(key),
                p.force_constant,
                p.equilibrium_length
            );
            writeln!(writer, "{}", with_comment(line, &p.comment))?;
        }
        writeln!(writer)?;

        writeln!(writer, "ANGLE")?;
        for (key, p) in set.angles.iter() {
            let line = format!(
                "{}  {:>14.8}  {:>14.8}",
                join_types(key),
                p.force_constant,
                p.equilibrium_angle
            );
            writeln!(writer, "{}", with_comment(line, &p.comment))?;
        }
        writeln!(writer)?;

        writeln!(writer, "DIHE")?;
        for (key, p) in set.dihedrals.iter() {
            let last = p.terms.len().saturating_sub(1);
            for (i, term) in p.terms.iter().enumerate() {
                let periodicity = if i < last {
                    -term.periodicity
                } else {
                    term.periodicity
                };
                let line = format!(
                    "{} {:>4} {:>14.8} {:>14.8} {:>14.8}",
                    join_types(key),
                    term.divider,
                    term.barrier,
                    term.phase,
                    periodicity
                );
                writeln!(writer, "{}", with_comment(line, &term.comment))?;
            }
        }
        writeln!(writer)?;

        writeln!(writer, "IMPROPER")?;
        for (key, p) in set.periodic_impropers.iter() {
            let line = format!(
                "{}      {:>14.8} {:>14.8} {:>14.8}",
                join_types(key),
                p.barrier,
                p.phase,
                p.periodicity
            );
            writeln!(writer, "{}", with_comment(line, &p.comment))?;
        }
        writeln!(writer)?;

        if !set.impropers.is_empty() {
            warn!(
                count = set.impropers.len(),
                "Harmonic impropers have no frcmod representation and were not written."
            );
        }

        writeln!(writer, "NONBON")?;
        for (key, params) in set.atom_types.iter() {
            let Some(lj) = params.lennard_jones else { continue };
            let line = format!(
                "  {:<2} {:>14.8} {:>14.8}",
                key[0], lj.radius, lj.well_depth
            );
            writeln!(writer, "{}", with_comment(line, &params.comment))?;
        }
        writeln!(writer)?;
        writeln!(writer)?;
        Ok(())
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<BondedParameterSet, FrcmodError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    pub fn write_to_path<P: AsRef<Path>>(
        set: &BondedParameterSet,
        path: P,
    ) -> Result<(), FrcmodError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(set, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
Remark line goes here
MASS
c3 12.010         0.878               same as c3
hc 1.008          0.135

BOND
c3-c3  300.90   1.5375       SOURCE1_SOURCE5   6723    0.0041
c -n   478.20   1.3450

ANGLE
c3-c3-hc   46.370     110.050   SOURCE3_SOURCE5

DIHE
X -c3-c3-X    1    0.180         0.000           3.000      SOURCE1
hc-c3-c -o    1    0.800         0.000          -1.000
hc-c3-c -o    1    0.080       180.000           3.000

IMPROPER
c3-n -c -o          1.1          180.0         2.0          Using default value

NONBON
  c3          1.9080  0.1094             same as c3
  hc          1.4870  0.0157

";

    fn read(text: &str) -> Result<BondedParameterSet, FrcmodError> {
        FrcmodFile::read_from(&mut Cursor::new(text.as_bytes()))
    }

    #[test]
    fn split_types_handles_space_padding() {
        let (types, rest) = split_types("X -c3-c3-X    1    0.180", 4, 1).unwrap();
        assert_eq!(types, vec!["X", "c3", "c3", "X"]);
        assert_eq!(rest.trim(), "1    0.180");
        let (types, _) = split_types("c -n   478.20   1.3450", 2, 1).unwrap();
        assert_eq!(types, vec!["c", "n"]);
    }

    #[test]
    fn split_types_rejects_missing_separators() {
        assert!(matches!(
            split_types("c3 300.0 1.5", 2, 7),
            Err(FrcmodError::Parse { line: 7, .. })
        ));
    }

    #[test]
    fn reads_every_section() {
        let set = read(SAMPLE).unwrap();
        assert_eq!(set.title, "Remark line goes here");

        let c3 = set.atom_types.get(&["c3"]).unwrap();
        assert_eq!(c3.mass, Some(12.010));
        assert_eq!(c3.polarizability, Some(0.878));
        assert_eq!(c3.comment, "same as c3");
        assert_eq!(
            c3.lennard_jones,
            Some(LennardJones {
                radius: 1.9080,
                well_depth: 0.1094
            })
        );

        assert_eq!(set.bonds.len(), 2);
        let cn = set.bonds.get(&["n", "c"]).unwrap();
        assert_eq!(cn.force_constant, 478.20);
        assert_eq!(
            set.bonds.get(&["c3", "c3"]).unwrap().comment,
            "SOURCE1_SOURCE5 6723 0.0041"
        );

        assert_eq!(set.angles.get(&["hc", "c3", "c3"]).unwrap().equilibrium_angle, 110.050);
        assert_eq!(set.periodic_impropers.len(), 1);
        assert!(set.periodic_impropers.get(&["c3", "n", "c", "o"]).is_some());
        assert!(set.impropers.is_empty());
    }

    #[test]
    fn negative_periodicity_continues_a_dihedral() {
        let set = read(SAMPLE).unwrap();
        assert_eq!(set.dihedrals.len(), 2);
        let terms = &set.dihedrals.get(&["o", "c", "c3", "hc"]).unwrap().terms;
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].periodicity, 1.0);
        assert_eq!(terms[1].periodicity, 3.0);
        assert_eq!(terms[1].phase, 180.0);
    }

    #[test]
    fn unexpected_text_outside_sections_is_an_error() {
        let err = read("title\nGARBAGE\n").unwrap_err();
        assert!(matches!(err, FrcmodError::Parse { line: 2, .. }));
    }

    #[test]
    fn written_file_reads_back_to_the_same_parameters() {
        let set = read(SAMPLE).unwrap();
        let mut buffer = Vec::new();
        FrcmodFile::write_to(&set, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("hc-c3-c -o    1     0.80000000     0.00000000    -1.00000000"));
        let back = read(&text).unwrap();
        assert_eq!(back, set);
    }

    const FITTED: &str = "\
Fitted torsions
MASS
c3 12.01078         0.87812345

BOND
c3-c3  300.9012   1.53751

ANGLE
c3-c3-hc   46.37123456     110.05012345

DIHE
c3-c3-c -o    1    0.12345678         0.000          -2.000
c3-c3-c -o    0    0.98765432       180.000           1.000
hc-c3-c -o  2.5    1.00000001        12.34567891       3.000

IMPROPER
c3-n -c -o          1.10000005          180.0         2.0

NONBON
  c3          1.90800012  0.10940003

";

    #[test]
    fn rewriting_keeps_every_digit_and_divider() {
        let set = read(FITTED).unwrap();
        let terms = &set.dihedrals.get(&["c3", "c3", "c", "o"]).unwrap().terms;
        assert_eq!(terms[0].barrier, 0.12345678);
        assert_eq!(terms[1].divider, 0.0);
        assert_eq!(
            set.dihedrals.get(&["hc", "c3", "c", "o"]).unwrap().terms[0].divider,
            2.5
        );

        let mut buffer = Vec::new();
        FrcmodFile::write_to(&set, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("0.12345678"));
        assert!(text.contains("300.90120000"));
        assert!(text.contains("1.53751000"));

        let back = read(&text).unwrap();
        assert_eq!(back, set);
        let bond = back.bonds.get(&["c3", "c3"]).unwrap();
        assert_eq!(bond.force_constant, 300.9012);
        assert_eq!(bond.equilibrium_length, 1.53751);
    }
}
