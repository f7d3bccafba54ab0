//! In-process stand-ins for the external programs, shared by the engine and workflow tests.

use super::tools::{EngineOutputs, EngineRequest, ParameterizationEngine, TemplateToolchain, ToolError};
use crate::core::io::cif::CifFile;
use crate::core::io::mol2::Mol2File;
use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::structure::MolecularStructure;
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const ENGINE_FRCMOD: &str = "\
Fake engine parameters
MASS
c3 12.010         0.878
hc 1.008          0.135
c  12.010         0.616
o  16.000         0.434
n  14.010         0.530
hn 1.008          0.161

BOND
c3-hc  330.60   1.0969
c3-c3  300.90   1.5375
c -o   637.70   1.2183
c -n   478.20   1.3450
c3-n   330.60   1.4550
n -hn  410.20   1.0090
c -c3  313.00   1.5241

ANGLE
hc-c3-hc   39.430     108.350
c3-c3-hc   46.370     110.050
n -c3-c3   65.730     110.640
c -n -c3   62.910     121.350
c3-c -o    67.400     123.200

DIHE
hc-c3-c3-hc   1    0.150         0.000           3.000
n -c3-c3-hc   1    0.156         0.000           3.000
c -n -c3-c3   1    0.000         0.000          -4.000
c -n -c3-c3   1    0.530         0.000           1.000

IMPROPER
c3-n -c -o          1.1          180.0         2.0

NONBON
  c3          1.9080  0.1094
  hc          1.4870  0.0157
";

/// An alanine residue in the frame of the bundled cap fragments.
pub(crate) fn alanine() -> MolecularStructure {
    let mut s = MolecularStructure::new();
    let atoms = [
        ("N", "N", [3.555, 3.970, 0.000]),
        ("H", "H", [2.733, 4.556, 0.000]),
        ("CA", "C", [4.853, 4.614, 0.000]),
        ("HA", "H", [5.408, 4.316, 0.890]),
        ("CB", "C", [5.661, 4.221, -1.232]),
        ("HB1", "H", [5.123, 4.521, -2.131]),
        ("HB2", "H", [6.630, 4.719, -1.206]),
        ("HB3", "H", [5.809, 3.141, -1.241]),
        ("C", "C", [4.713, 6.129, 0.000]),
        ("O", "O", [3.601, 6.653, 0.000]),
    ];
    let ids: Vec<_> = atoms
        .iter()
        .map(|(name, element, [x, y, z])| {
            s.add_atom(Atom::new(name, element, "ALA", Point3::new(*x, *y, *z)))
        })
        .collect();
    for (a, b, order) in [
        (0, 1, BondOrder::Single),
        (0, 2, BondOrder::Single),
        (2, 3, BondOrder::Single),
        (2, 4, BondOrder::Single),
        (4, 5, BondOrder::Single),
        (4, 6, BondOrder::Single),
        (4, 7, BondOrder::Single),
        (2, 8, BondOrder::Single),
        (8, 9, BondOrder::Double),
    ] {
        s.add_bond(ids[a], ids[b], order);
    }
    s
}

fn gaff_type(structure: &MolecularStructure, index: usize) -> &'static str {
    let (Some(atom), Some(id)) = (structure.atom_at(index), structure.atom_id_at(index)) else {
        return "du";
    };
    let neighbor_elements: Vec<&str> = structure
        .get_bonded_neighbors(id)
        .unwrap_or(&[])
        .iter()
        .filter_map(|&n| structure.atom(n))
        .map(|n| n.element.as_str())
        .collect();
    match atom.element.as_str() {
        "N" => "n",
        "O" => "o",
        "H" if neighbor_elements.contains(&"N") => "hn",
        "H" => "hc",
        "C" if neighbor_elements.contains(&"O") => "c",
        "C" => "c3",
        _ => "du",
    }
}

/// What the fake engine was asked to do.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub residue_name: String,
    pub net_charge: i32,
    pub atom_count: usize,
    pub dihedrals: Vec<String>,
    pub fit_dihedrals: bool,
    pub calculator: Option<String>,
    pub structure_file_exists: bool,
    pub output_dir: PathBuf,
}

/// Types atoms like GAFF2 would, renames them, reverses their order and writes the engine's
/// result files.
#[derive(Default)]
pub(crate) struct FakeEngine {
    pub requests: RefCell<Vec<RecordedRequest>>,
}

impl ParameterizationEngine for FakeEngine {
    fn parameterize(&self, request: &EngineRequest<'_>) -> Result<EngineOutputs, ToolError> {
        let input = request.structure;
        self.requests.borrow_mut().push(RecordedRequest {
            residue_name: request.residue_name.to_string(),
            net_charge: request.net_charge,
            atom_count: input.len(),
            dihedrals: request.dihedrals.to_vec(),
            fit_dihedrals: request.fit_dihedrals,
            calculator: request.calculator.map(|c| c.name.clone()),
            structure_file_exists: request.structure_file.is_file(),
            output_dir: request.output_dir.to_path_buf(),
        });

        let mut output = MolecularStructure::new();
        let mut new_ids = vec![None; input.len()];
        for index in (0..input.len()).rev() {
            let Some(atom) = input.atom_at(index) else {
                continue;
            };
            let mut atom = atom.clone();
            atom.atom_type = gaff_type(input, index).to_string();
            atom.name = format!("{}{}", atom.element, index + 1);
            atom.formal_charge = 0;
            new_ids[index] = Some(output.add_atom(atom));
        }
        for (a, b) in input.bonded_index_pairs() {
            if let (Some(a), Some(b)) = (new_ids[a], new_ids[b]) {
                output.add_bond(a, b, BondOrder::Single);
            }
        }

        let outputs = EngineOutputs::expected(request.output_dir, request.residue_name);
        if let Some(dir) = outputs.structure.parent() {
            fs::create_dir_all(dir)?;
        }
        CifFile::write_to_path(&output, &outputs.structure)
            .map_err(|e| ToolError::Io(std::io::Error::other(e.to_string())))?;
        fs::write(&outputs.parameters, ENGINE_FRCMOD)?;
        Ok(outputs)
    }
}

/// An engine whose process always exits with an error.
pub(crate) struct FailingEngine;

impl ParameterizationEngine for FailingEngine {
    fn parameterize(&self, _request: &EngineRequest<'_>) -> Result<EngineOutputs, ToolError> {
        Err(ToolError::Failed {
            program: "parameterize".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "SCF did not converge".to_string(),
        })
    }
}

/// Writes the files antechamber and prepgen would, with prepgen's upper-cased atom names.
#[derive(Default)]
pub(crate) struct FakeToolchain {
    pub net_charges: RefCell<Vec<i32>>,
}

impl TemplateToolchain for FakeToolchain {
    fn generate_connectivity(
        &self,
        mol2: &Path,
        ac: &Path,
        net_charge: i32,
    ) -> Result<(), ToolError> {
        self.net_charges.borrow_mut().push(net_charge);
        fs::copy(mol2, ac)?;
        Ok(())
    }

    fn generate_template(
        &self,
        ac: &Path,
        main_chain: &Path,
        prepi: &Path,
        residue_name: &str,
    ) -> Result<(), ToolError> {
        if !main_chain.is_file() {
            return Err(ToolError::MissingOutput {
                program: "prepgen".to_string(),
                path: main_chain.to_path_buf(),
            });
        }
        let structure = Mol2File::read_from_path(ac)
            .map_err(|e| ToolError::Io(std::io::Error::other(e.to_string())))?;

        let mut text = format!(
            "    0    0    2\n\nThis is a remark line\nmolecule.res\n{residue_name}  INT  0\nCORR OMIT DU   BEG\n  0.0000\n"
        );
        for i in 1..=3 {
            text.push_str(&format!(
                "{i:>4}  DUMM  DU    M    0  -1  -2     0.000      0.000      0.000   0.00000\n"
            ));
        }
        for (offset, (_, atom)) in structure.atoms_iter().enumerate() {
            text.push_str(&format!(
                "{:>4}  {:<4}  {:<4}  M    0   0   0     1.500    109.500    180.000 {:>9.5}\n",
                offset + 4,
                atom.name.to_uppercase(),
                atom.atom_type,
                atom.partial_charge
            ));
        }
        text.push_str("\nLOOP\n\nIMPROPER\n\nDONE\nSTOP\n");
        fs::write(prepi, text)?;
        Ok(())
    }
}
