use crate::core::models::structure::MolecularStructure;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

const CORR_MARKER: &str = "CORR";
const NAME_FIELD: std::ops::Range<usize> = 6..10;
const DUMMY_ATOM: &str = "DUMM";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Residue template has no 'CORR' atom section")]
    MissingAtomSection,
}

/// Index range of the atom records: from two lines below the `CORR` line up to the next blank
/// line.
fn atom_record_range(lines: &[&str]) -> Result<std::ops::Range<usize>, TemplateError> {
    let corr = lines
        .iter()
        .position(|line| line.trim_start().starts_with(CORR_MARKER))
        .ok_or(TemplateError::MissingAtomSection)?;
    let start = (corr + 2).min(lines.len());
    let end = lines[start..]
        .iter()
        .position(|line| line.trim().is_empty())
        .map_or(lines.len(), |offset| start + offset);
    Ok(start..end)
}

/// Restores the case of atom names in an Amber prep template.
///
/// prepgen upper-cases atom names it writes. Every atom record whose name matches an atom of
/// `structure` case-insensitively, but not exactly, is rewritten with the structure's spelling,
/// padded to the four-character field. Returns the number of records changed.
pub fn fix_atom_name_capitalization(
    structure: &MolecularStructure,
    path: &Path,
) -> Result<usize, TemplateError> {
    // Names equal up to case resolve to the last one in sorted order.
    let unique: BTreeSet<&str> = structure
        .atoms_iter()
        .map(|(_, atom)| atom.name.as_str())
        .collect();
    let canonical: HashMap<String, &str> = unique
        .into_iter()
        .map(|name| (name.to_uppercase(), name))
        .collect();

    let text = fs::read_to_string(path)?;
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let range = {
        let borrowed: Vec<&str> = lines.iter().map(String::as_str).collect();
        atom_record_range(&borrowed)?
    };

    let mut changed = 0;
    for line in &mut lines[range] {
        let Some(field) = line.get(NAME_FIELD) else {
            continue;
        };
        let current = field.trim();
        let Some(&correct) = canonical.get(&current.to_uppercase()) else {
            continue;
        };
        if current == correct {
            continue;
        }
        info!(from = current, to = correct, "Fixing atom name capitalization in residue template.");
        line.replace_range(NAME_FIELD, &format!("{:<4}", correct));
        changed += 1;
    }

    let mut output = lines.join("\n");
    if text.ends_with('\n') {
        output.push('\n');
    }
    fs::write(path, output)?;
    Ok(changed)
}

/// Lists the atom names of a prep template's atom records, without the dummy atoms.
#[cfg(test)]
pub(crate) fn read_template_atom_names(path: &Path) -> Result<Vec<String>, TemplateError> {
    let text = fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().collect();
    let range = atom_record_range(&lines)?;
    Ok(lines[range]
        .iter()
        .filter_map(|line| line.get(NAME_FIELD))
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != DUMMY_ATOM)
        .map(str::to_string)
        .collect())
}

/// Writes the prepgen main-chain control file for a residue inserted into a peptide chain.
pub fn write_main_chain_file(path: &Path, net_charge: i32) -> Result<(), TemplateError> {
    let content = format!(
        "HEAD_NAME N\nTAIL_NAME C\nMAIN_CHAIN CA\nPRE_HEAD_TYPE C\nPOST_TAIL_TYPE N\nCHARGE {:.1}\n",
        f64::from(net_charge)
    );
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;
    use tempfile::tempdir;

    const TEMPLATE: &str = "    0    0    2

This is a remark line
molecule.res
XYZ  INT  0
CORR OMIT DU   BEG
  0.0000
   1  DUMM  DU    M    0  -1  -2     0.000      0.000      0.000   0.00000
   2  DUMM  DU    M    1   0  -1     1.449      0.000      0.000   0.00000
   3  DUMM  DU    M    2   1   0     1.522    111.100      0.000   0.00000
   4  N     N     M    3   2   1     1.335    116.600    180.000  -0.41570
   5  CA1   CT    M    4   3   2     1.449    121.900    180.000   0.03370
   6  CL    cl    E    5   4   3     1.770    109.500     60.000  -0.10000

LOOP

IMPROPER

DONE
STOP
";

    fn structure() -> MolecularStructure {
        let mut s = MolecularStructure::new();
        for name in ["N", "Ca1", "Cl", "Xx"] {
            s.add_atom(Atom::new(name, "C", "XYZ", Point3::origin()));
        }
        s
    }

    #[test]
    fn restores_case_and_preserves_field_width() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("XYZ.prepi");
        fs::write(&path, TEMPLATE).unwrap();

        let changed = fix_atom_name_capitalization(&structure(), &path).unwrap();
        assert_eq!(changed, 2);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("   5  Ca1   CT    M"));
        assert!(text.contains("   6  Cl    cl    E"));
        assert!(text.contains("   4  N     N     M"));
        assert!(text.contains("   1  DUMM  DU"));
        assert_eq!(text.lines().count(), TEMPLATE.lines().count());
        assert!(text.ends_with("STOP\n"));
    }

    #[test]
    fn running_twice_changes_nothing_more() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("XYZ.prepi");
        fs::write(&path, TEMPLATE).unwrap();

        fix_atom_name_capitalization(&structure(), &path).unwrap();
        let once = fs::read_to_string(&path).unwrap();
        assert_eq!(fix_atom_name_capitalization(&structure(), &path).unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), once);
    }

    #[test]
    fn names_without_a_match_are_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("XYZ.prepi");
        fs::write(&path, TEMPLATE).unwrap();

        let mut s = MolecularStructure::new();
        s.add_atom(Atom::new("Q1", "C", "XYZ", Point3::origin()));
        assert_eq!(fix_atom_name_capitalization(&s, &path).unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), TEMPLATE);
    }

    #[test]
    fn template_without_corr_line_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.prepi");
        fs::write(&path, "nothing here\n").unwrap();
        assert!(matches!(
            fix_atom_name_capitalization(&structure(), &path),
            Err(TemplateError::MissingAtomSection)
        ));
    }

    #[test]
    fn lists_atom_names_without_dummies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("XYZ.prepi");
        fs::write(&path, TEMPLATE).unwrap();
        assert_eq!(read_template_atom_names(&path).unwrap(), vec!["N", "CA1", "CL"]);
    }

    #[test]
    fn main_chain_file_has_fixed_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mainchain.xyz");
        write_main_chain_file(&path, -1).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "HEAD_NAME N\nTAIL_NAME C\nMAIN_CHAIN CA\nPRE_HEAD_TYPE C\nPOST_TAIL_TYPE N\nCHARGE -1.0\n"
        );
    }

    #[test]
    fn indented_corr_line_still_opens_the_atom_section() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("XYZ.prepi");
        fs::write(&path, TEMPLATE.replace("CORR OMIT DU   BEG", "  CORR OMIT DU   BEG")).unwrap();

        let changed = fix_atom_name_capitalization(&structure(), &path).unwrap();

        assert_eq!(changed, 2);
        assert_eq!(read_template_atom_names(&path).unwrap(), vec!["N", "Ca1", "Cl"]);
    }

    #[test]
    fn names_equal_up_to_case_resolve_in_sorted_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("XYZ.prepi");
        fs::write(&path, TEMPLATE).unwrap();
        let mut s = MolecularStructure::new();
        for name in ["ca1", "Ca1", "CL"] {
            s.add_atom(Atom::new(name, "C", "XYZ", Point3::origin()));
        }

        fix_atom_name_capitalization(&s, &path).unwrap();

        assert_eq!(read_template_atom_names(&path).unwrap(), vec!["N", "ca1", "CL"]);
    }
}
