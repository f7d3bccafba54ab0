use super::elements::{canonical_element, guess_element_from_name};
use super::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::structure::MolecularStructure;
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Mol2Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Missing required section: {0}")]
    MissingSection(&'static str),
}

fn parse_error(line: usize, message: &str) -> Mol2Error {
    Mol2Error::Parse {
        line,
        message: message.to_string(),
    }
}

fn find_section(lines: &[(usize, String)], name: &str) -> Option<usize> {
    lines
        .iter()
        .position(|(_, line)| line.trim().eq_ignore_ascii_case(name))
}

/// Data lines of a section: everything up to the next `@<TRIPOS>` header, skipping blanks and
/// comments.
fn section_lines(lines: &[(usize, String)], header: usize) -> impl Iterator<Item = &(usize, String)> {
    lines[header + 1..]
        .iter()
        .take_while(|(_, line)| !line.trim_start().starts_with("@<TRIPOS>"))
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
}

/// Infers an element from a mol2 atom type (SYBYL `C.3` style) or, failing that, the atom name.
fn infer_element(atom_type: &str, name: &str) -> Option<&'static str> {
    atom_type
        .split('.')
        .next()
        .filter(|_| atom_type.contains('.'))
        .and_then(canonical_element)
        .or_else(|| guess_element_from_name(name))
}

/// Tripos mol2 files. The atom type column carries the force field atom type and the charge
/// column the partial charge.
pub struct Mol2File;

impl StructureFile for Mol2File {
    type Error = Mol2Error;

    fn read_from(reader: &mut impl BufRead) -> Result<MolecularStructure, Self::Error> {
        let lines: Vec<(usize, String)> = reader
            .lines()
            .enumerate()
            .map(|(i, line)| line.map(|v| (i + 1, v)))
            .collect::<Result<_, _>>()?;

        let molecule = find_section(&lines, "@<TRIPOS>MOLECULE")
            .ok_or(Mol2Error::MissingSection("@<TRIPOS>MOLECULE"))?;
        let molecule_name = section_lines(&lines, molecule)
            .next()
            .map(|(_, name)| name.trim().to_string())
            .unwrap_or_else(|| "UNK".to_string());

        let atom_header = find_section(&lines, "@<TRIPOS>ATOM")
            .ok_or(Mol2Error::MissingSection("@<TRIPOS>ATOM"))?;

        let mut structure = MolecularStructure::new();
        let mut id_map = HashMap::new();

        for (ln, raw) in section_lines(&lines, atom_header) {
            let parts: Vec<&str> = raw.split_whitespace().collect();
            if parts.len() < 6 {
                return Err(parse_error(*ln, "invalid ATOM line"));
            }
            let serial: usize = parts[0]
                .parse()
                .map_err(|_| parse_error(*ln, "invalid atom id in ATOM line"))?;
            let mut coords = [0.0; 3];
            for (axis, value) in coords.iter_mut().zip(&parts[2..5]) {
                *axis = value
                    .parse()
                    .map_err(|_| parse_error(*ln, "invalid coordinate in ATOM line"))?;
            }
            let name = parts[1];
            let atom_type = parts[5];
            let element = infer_element(atom_type, name)
                .ok_or_else(|| parse_error(*ln, "unable to infer element"))?;
            let residue = parts.get(7).copied().unwrap_or(molecule_name.as_str());

            let mut atom = Atom::new(name, element, residue, Point3::from(coords));
            atom.atom_type = atom_type.to_string();
            if let Some(charge) = parts.get(8) {
                atom.partial_charge = charge
                    .parse()
                    .map_err(|_| parse_error(*ln, "invalid charge in ATOM line"))?;
            }
            id_map.insert(serial, structure.add_atom(atom));
        }

        if let Some(bond_header) = find_section(&lines, "@<TRIPOS>BOND") {
            for (ln, raw) in section_lines(&lines, bond_header) {
                let parts: Vec<&str> = raw.split_whitespace().collect();
                if parts.len() < 4 {
                    return Err(parse_error(*ln, "invalid BOND line"));
                }
                let lookup = |token: &str| {
                    token
                        .parse::<usize>()
                        .ok()
                        .and_then(|serial| id_map.get(&serial).copied())
                        .ok_or_else(|| parse_error(*ln, "bond references unknown atom id"))
                };
                let a = lookup(parts[1])?;
                let b = lookup(parts[2])?;
                let order = parts[3]
                    .parse()
                    .map_err(|_| parse_error(*ln, "unsupported bond type in BOND line"))?;
                structure.add_bond(a, b, order);
            }
        }

        Ok(structure)
    }

    fn write_to(
        structure: &MolecularStructure,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let residue = structure.residue_name().unwrap_or("UNK");

        writeln!(writer, "@<TRIPOS>MOLECULE")?;
        writeln!(writer, "{}", residue)?;
        writeln!(
            writer,
            "{:>5} {:>5} 1 0 0",
            structure.len(),
            structure.bonds().len()
        )?;
        writeln!(writer, "SMALL")?;
        writeln!(writer, "USER_CHARGES")?;
        writeln!(writer)?;

        writeln!(writer, "@<TRIPOS>ATOM")?;
        for (i, (_, atom)) in structure.atoms_iter().enumerate() {
            let atom_type = if atom.atom_type.is_empty() {
                atom.element.as_str()
            } else {
                atom.atom_type.as_str()
            };
            writeln!(
                writer,
                "{:>7} {:<8} {:>10.4} {:>10.4} {:>10.4} {:<6} {:>3} {:<8} {:>10.6}",
                i + 1,
                atom.name,
                atom.position.x,
                atom.position.y,
                atom.position.z,
                atom_type,
                1,
                atom.residue_name,
                atom.partial_charge
            )?;
        }

        writeln!(writer, "@<TRIPOS>BOND")?;
        for (i, bond) in structure.bonds().iter().enumerate() {
            let (Some(a), Some(b)) = (
                structure.index_of(bond.atom1_id),
                structure.index_of(bond.atom2_id),
            ) else {
                continue;
            };
            writeln!(
                writer,
                "{:>6} {:>5} {:>5} {}",
                i + 1,
                a + 1,
                b + 1,
                bond.order.mol2_token()
            )?;
        }
        Ok(())
    }
}
