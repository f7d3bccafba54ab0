use super::elements::{canonical_element, guess_element_from_name};
use super::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::ids::AtomId;
use crate::core::models::structure::MolecularStructure;
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const ATOM_CATEGORY: &str = "_chem_comp_atom";
const BOND_CATEGORY: &str = "_chem_comp_bond";

#[derive(Debug, Error)]
pub enum CifError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Missing required category: {0}")]
    MissingCategory(&'static str),
    #[error("Category '{category}' is missing required column '{column}'")]
    MissingColumn {
        category: &'static str,
        column: &'static str,
    },
    #[error("Invalid value '{value}' for column '{column}' on line {line}")]
    InvalidValue {
        line: usize,
        column: String,
        value: String,
    },
    #[error("Bond references unknown atom '{0}'")]
    UnknownAtom(String),
    #[error("Atom name '{0}' is not unique and the bond carries no atom ordinals")]
    AmbiguousAtom(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    line: usize,
    quoted: bool,
}

impl Token {
    fn is_keyword(&self) -> bool {
        !self.quoted
            && (self.text.starts_with('_')
                || self.text.eq_ignore_ascii_case("loop_")
                || self.text.to_ascii_lowercase().starts_with("data_"))
    }

    /// The token value, or `None` for the CIF null markers `?` and `.`.
    fn value(&self) -> Option<&str> {
        if !self.quoted && (self.text == "?" || self.text == ".") {
            None
        } else {
            Some(&self.text)
        }
    }
}

fn tokenize_line(line: &str, line_num: usize, tokens: &mut Vec<Token>) {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }
        if c == '\'' || c == '"' {
            let mut text = String::new();
            let mut j = i + 1;
            while j < chars.len() {
                let closes = chars[j] == c && chars.get(j + 1).is_none_or(|n| n.is_whitespace());
                if closes {
                    break;
                }
                text.push(chars[j]);
                j += 1;
            }
            tokens.push(Token {
                text,
                line: line_num,
                quoted: true,
            });
            i = j + 1;
            continue;
        }
        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        tokens.push(Token {
            text: chars[start..i].iter().collect(),
            line: line_num,
            quoted: false,
        });
    }
}

fn tokenize(reader: &mut impl BufRead) -> Result<Vec<Token>, CifError> {
    let mut tokens = Vec::new();
    let mut text_field: Option<(usize, String)> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = idx + 1;

        if let Some((start, mut text)) = text_field.take() {
            if line.starts_with(';') {
                tokens.push(Token {
                    text: text.trim_end().to_string(),
                    line: start,
                    quoted: true,
                });
            } else {
                text.push_str(&line);
                text.push('\n');
                text_field = Some((start, text));
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix(';') {
            text_field = Some((line_num, format!("{rest}\n")));
            continue;
        }

        tokenize_line(&line, line_num, &mut tokens);
    }

    if let Some((start, _)) = text_field {
        return Err(CifError::Parse {
            line: start,
            message: "unterminated text field".to_string(),
        });
    }
    Ok(tokens)
}

/// The rows of one CIF category, whether it was written as a loop or as key-value items.
#[derive(Debug, Default)]
struct CategoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<Token>>,
}

impl CategoryTable {
    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    fn require(&self, category: &'static str, name: &'static str) -> Result<usize, CifError> {
        self.column(name).ok_or(CifError::MissingColumn {
            category,
            column: name,
        })
    }
}

#[derive(Debug, Default)]
struct DataBlock {
    items: Vec<(String, Token)>,
    loops: Vec<CategoryTable>,
}

impl DataBlock {
    fn parse(tokens: Vec<Token>) -> Result<Self, CifError> {
        let mut block = DataBlock::default();
        let mut iter = tokens.into_iter().peekable();
        let mut seen_data = false;

        while let Some(token) = iter.next() {
            let lower = token.text.to_ascii_lowercase();
            if !token.quoted && lower.starts_with("data_") {
                if seen_data {
                    break;
                }
                seen_data = true;
                continue;
            }
            if !token.quoted && lower == "loop_" {
                let mut headers = Vec::new();
                while let Some(next) = iter.peek() {
                    if next.quoted || !next.text.starts_with('_') {
                        break;
                    }
                    headers.push(next.text.clone());
                    iter.next();
                }
                let mut values = Vec::new();
                while let Some(next) = iter.peek() {
                    if next.is_keyword() {
                        break;
                    }
                    values.extend(iter.next());
                }
                if headers.is_empty() || values.len() % headers.len() != 0 {
                    return Err(CifError::Parse {
                        line: token.line,
                        message: format!(
                            "loop has {} values for {} columns",
                            values.len(),
                            headers.len()
                        ),
                    });
                }
                let rows = values
                    .chunks(headers.len())
                    .map(<[Token]>::to_vec)
                    .collect();
                block.loops.push(CategoryTable {
                    columns: headers,
                    rows,
                });
                continue;
            }
            if !token.quoted && token.text.starts_with('_') {
                match iter.next() {
                    Some(value) if !value.is_keyword() => block.items.push((token.text, value)),
                    _ => {
                        return Err(CifError::Parse {
                            line: token.line,
                            message: format!("tag '{}' has no value", token.text),
                        });
                    }
                }
                continue;
            }
            return Err(CifError::Parse {
                line: token.line,
                message: format!("unexpected value '{}'", token.text),
            });
        }
        Ok(block)
    }

    fn item(&self, tag: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(tag))
            .and_then(|(_, v)| v.value())
    }

    /// Collects a category as a table, stripping the `_category.` prefix from column names.
    fn category(&self, category: &str) -> Option<CategoryTable> {
        let prefix = format!("{}.", category.to_ascii_lowercase());
        let strip = |tag: &str| -> Option<String> {
            let lower = tag.to_ascii_lowercase();
            lower
                .starts_with(&prefix)
                .then(|| tag[prefix.len()..].to_string())
        };

        if let Some(table) = self
            .loops
            .iter()
            .find(|l| l.columns.first().is_some_and(|c| strip(c.as_str()).is_some()))
        {
            return Some(CategoryTable {
                columns: table.columns.iter().filter_map(|c| strip(c.as_str())).collect(),
                rows: table.rows.clone(),
            });
        }

        let (columns, row): (Vec<String>, Vec<Token>) = self
            .items
            .iter()
            .filter_map(|(tag, value)| strip(tag.as_str()).map(|c| (c, value.clone())))
            .unzip();
        if columns.is_empty() {
            None
        } else {
            Some(CategoryTable {
                columns,
                rows: vec![row],
            })
        }
    }
}

fn cell<'a>(row: &'a [Token], column: Option<usize>) -> Option<&'a str> {
    column.and_then(|c| row.get(c)).and_then(Token::value)
}

fn parse_f64(row: &[Token], column: usize, name: &str) -> Result<f64, CifError> {
    let token = &row[column];
    let text = token.value().ok_or_else(|| CifError::InvalidValue {
        line: token.line,
        column: name.to_string(),
        value: token.text.clone(),
    })?;
    text.parse().map_err(|_| CifError::InvalidValue {
        line: token.line,
        column: name.to_string(),
        value: text.to_string(),
    })
}

fn parse_formal_charge(token: &Token) -> Result<i32, CifError> {
    let Some(text) = token.value() else {
        return Ok(0);
    };
    text.parse::<i32>()
        .or_else(|_| text.parse::<f64>().map(|v| v.round() as i32))
        .map_err(|_| CifError::InvalidValue {
            line: token.line,
            column: "charge".to_string(),
            value: text.to_string(),
        })
}

fn coordinate_columns(table: &CategoryTable) -> Result<[usize; 3], CifError> {
    for prefix in ["model_Cartn_", "pdbx_model_Cartn_", "Cartn_"] {
        let suffix = if prefix == "pdbx_model_Cartn_" { "_ideal" } else { "" };
        let found: Vec<Option<usize>> = ["x", "y", "z"]
            .iter()
            .map(|axis| table.column(&format!("{prefix}{axis}{suffix}")))
            .collect();
        if let [Some(x), Some(y), Some(z)] = found[..] {
            return Ok([x, y, z]);
        }
    }
    Err(CifError::MissingColumn {
        category: ATOM_CATEGORY,
        column: "model_Cartn_x",
    })
}

fn quote_string(s: &str) -> String {
    if s.is_empty() {
        return "?".to_string();
    }
    if !s.contains(char::is_whitespace) && !s.contains('\'') && !s.contains('"') {
        return s.to_string();
    }
    if s.contains('\'') && !s.contains('"') {
        return format!("\"{}\"", s);
    }
    format!("'{}'", s)
}

/// Chemical component (chem-comp) CIF files: one residue with `_chem_comp_atom` and
/// `_chem_comp_bond` categories.
pub struct CifFile;

impl StructureFile for CifFile {
    type Error = CifError;

    fn read_from(reader: &mut impl BufRead) -> Result<MolecularStructure, Self::Error> {
        let block = DataBlock::parse(tokenize(reader)?)?;
        let default_residue = block.item("_chem_comp.id").unwrap_or("UNK").to_string();

        let atoms = block
            .category(ATOM_CATEGORY)
            .ok_or(CifError::MissingCategory(ATOM_CATEGORY))?;
        let name_col = atoms.require(ATOM_CATEGORY, "atom_id")?;
        let [x_col, y_col, z_col] = coordinate_columns(&atoms)?;
        let comp_col = atoms.column("comp_id");
        let element_col = atoms.column("type_symbol");
        let charge_col = atoms.column("charge");
        let partial_col = atoms.column("partial_charge");
        let type_col = atoms.column("atom_type");
        let ordinal_col = atoms.column("pdbx_ordinal");

        let mut structure = MolecularStructure::new();
        let mut by_ordinal: HashMap<String, AtomId> = HashMap::new();
        let mut by_name: HashMap<String, Vec<AtomId>> = HashMap::new();

        for row in &atoms.rows {
            let line = row.first().map_or(0, |t| t.line);
            let name = cell(row, Some(name_col)).ok_or_else(|| CifError::InvalidValue {
                line,
                column: "atom_id".to_string(),
                value: "?".to_string(),
            })?;
            let element = cell(row, element_col)
                .and_then(canonical_element)
                .or_else(|| guess_element_from_name(name))
                .ok_or_else(|| CifError::InvalidValue {
                    line,
                    column: "type_symbol".to_string(),
                    value: cell(row, element_col).unwrap_or(name).to_string(),
                })?;
            let residue = cell(row, comp_col).unwrap_or(&default_residue);
            let position = Point3::new(
                parse_f64(row, x_col, "Cartn_x")?,
                parse_f64(row, y_col, "Cartn_y")?,
                parse_f64(row, z_col, "Cartn_z")?,
            );

            let mut atom = Atom::new(name, element, residue, position);
            if let Some(c) = charge_col {
                atom.formal_charge = parse_formal_charge(&row[c])?;
            }
            if let Some(c) = partial_col.filter(|&c| row[c].value().is_some()) {
                atom.partial_charge = parse_f64(row, c, "partial_charge")?;
            }
            if let Some(atom_type) = cell(row, type_col) {
                atom.atom_type = atom_type.to_string();
            }

            let id = structure.add_atom(atom);
            if let Some(ordinal) = cell(row, ordinal_col) {
                by_ordinal.insert(ordinal.to_string(), id);
            }
            by_name.entry(name.to_string()).or_default().push(id);
        }

        let Some(bonds) = block.category(BOND_CATEGORY) else {
            return Ok(structure);
        };
        let first_col = bonds.require(BOND_CATEGORY, "atom_id_1")?;
        let second_col = bonds.require(BOND_CATEGORY, "atom_id_2")?;
        let order_col = bonds.column("value_order");
        let ordinal_cols = [
            bonds.column("pdbx_atom_ordinal_1"),
            bonds.column("pdbx_atom_ordinal_2"),
        ];

        let resolve = |row: &[Token], name_col: usize, ordinal_col: Option<usize>| {
            if let Some(ordinal) = cell(row, ordinal_col) {
                return by_ordinal
                    .get(ordinal)
                    .copied()
                    .ok_or_else(|| CifError::UnknownAtom(ordinal.to_string()));
            }
            let name = cell(row, Some(name_col)).unwrap_or("?");
            match by_name.get(name).map(Vec::as_slice) {
                Some([id]) => Ok(*id),
                Some([_, _, ..]) => Err(CifError::AmbiguousAtom(name.to_string())),
                _ => Err(CifError::UnknownAtom(name.to_string())),
            }
        };

        for row in &bonds.rows {
            let a = resolve(row, first_col, ordinal_cols[0])?;
            let b = resolve(row, second_col, ordinal_cols[1])?;
            let order = match cell(row, order_col) {
                Some(text) => text.parse().map_err(|_| CifError::InvalidValue {
                    line: row.first().map_or(0, |t| t.line),
                    column: "value_order".to_string(),
                    value: text.to_string(),
                })?,
                None => BondOrder::Single,
            };
            structure.add_bond(a, b, order);
        }

        Ok(structure)
    }

    fn write_to(
        structure: &MolecularStructure,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let residue = structure.residue_name().unwrap_or("UNK");
        writeln!(writer, "data_{}", residue)?;
        writeln!(writer, "#")?;
        writeln!(writer, "_chem_comp.id {}", quote_string(residue))?;
        writeln!(writer, "_chem_comp.type NON-POLYMER")?;
        writeln!(writer, "#")?;

        writeln!(writer, "loop_")?;
        for column in [
            "comp_id",
            "atom_id",
            "type_symbol",
            "charge",
            "partial_charge",
            "atom_type",
            "model_Cartn_x",
            "model_Cartn_y",
            "model_Cartn_z",
            "pdbx_ordinal",
        ] {
            writeln!(writer, "{ATOM_CATEGORY}.{column}")?;
        }
        for (i, (_, atom)) in structure.atoms_iter().enumerate() {
            writeln!(
                writer,
                "{} {:<6} {:<2} {:>2} {:>9.6} {:<4} {:>9.3} {:>9.3} {:>9.3} {}",
                quote_string(&atom.residue_name),
                quote_string(&atom.name),
                atom.element,
                atom.formal_charge,
                atom.partial_charge,
                quote_string(&atom.atom_type),
                atom.position.x,
                atom.position.y,
                atom.position.z,
                i + 1
            )?;
        }
        writeln!(writer, "#")?;

        if structure.bonds().is_empty() {
            return Ok(());
        }

        writeln!(writer, "loop_")?;
        for column in [
            "comp_id",
            "atom_id_1",
            "atom_id_2",
            "value_order",
            "pdbx_atom_ordinal_1",
            "pdbx_atom_ordinal_2",
            "pdbx_ordinal",
        ] {
            writeln!(writer, "{BOND_CATEGORY}.{column}")?;
        }
        for (i, bond) in structure.bonds().iter().enumerate() {
            let (Some(a), Some(b)) = (
                structure.index_of(bond.atom1_id),
                structure.index_of(bond.atom2_id),
            ) else {
                continue;
            };
            let (Some(atom_a), Some(atom_b)) = (structure.atom_at(a), structure.atom_at(b)) else {
                continue;
            };
            writeln!(
                writer,
                "{} {:<6} {:<6} {} {} {} {}",
                quote_string(residue),
                quote_string(&atom_a.name),
                quote_string(&atom_b.name),
                bond.order.cif_token(),
                a + 1,
                b + 1,
                i + 1
            )?;
        }
        writeln!(writer, "#")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GLYCINE_LIKE: &str = r#"data_GLX
#
_chem_comp.id GLX
_chem_comp.type 'L-PEPTIDE LINKING'
#
loop_
_chem_comp_atom.comp_id
_chem_comp_atom.atom_id
_chem_comp_atom.type_symbol
_chem_comp_atom.charge
_chem_comp_atom.model_Cartn_x
_chem_comp_atom.model_Cartn_y
_chem_comp_atom.model_Cartn_z
_chem_comp_atom.pdbx_ordinal
GLX N   N 1 3.555 3.970 0.000 1
GLX CA  C 0 4.853 4.614 0.000 2
GLX C   C 0
  4.713 6.129 0.000 3
GLX "O1'" O ? 3.601 6.653 0.000 4
#
loop_
_chem_comp_bond.atom_id_1
_chem_comp_bond.atom_id_2
_chem_comp_bond.value_order
N  CA SING
CA C  SING
C  "O1'" DOUB
#
"#;

    fn read(text: &str) -> Result<MolecularStructure, CifError> {
        CifFile::read_from(&mut Cursor::new(text.as_bytes()))
    }

    #[test]
    fn reads_atoms_bonds_and_charges() {
        let s = read(GLYCINE_LIKE).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s.bonds().len(), 3);
        let n = s.atom_at(0).unwrap();
        assert_eq!(n.name, "N");
        assert_eq!(n.element, "N");
        assert_eq!(n.formal_charge, 1);
        assert_eq!(n.residue_name, "GLX");
        assert_eq!(n.position, Point3::new(3.555, 3.970, 0.0));
        let o = s.atom_at(3).unwrap();
        assert_eq!(o.name, "O1'");
        assert_eq!(o.formal_charge, 0);
        assert_eq!(s.bonds()[2].order, BondOrder::Double);
    }

    #[test]
    fn rows_may_span_lines() {
        let s = read(GLYCINE_LIKE).unwrap();
        assert_eq!(s.atom_at(2).unwrap().position, Point3::new(4.713, 6.129, 0.0));
    }

    #[test]
    fn missing_atom_category_is_an_error() {
        let err = read("data_X\n_chem_comp.id X\n").unwrap_err();
        assert!(matches!(err, CifError::MissingCategory(_)));
    }

    #[test]
    fn invalid_coordinate_is_an_error() {
        let text = GLYCINE_LIKE.replace("4.853", "abc");
        let err = read(&text).unwrap_err();
        assert!(matches!(err, CifError::InvalidValue { .. }));
    }

    #[test]
    fn bond_to_unknown_atom_is_an_error() {
        let text = GLYCINE_LIKE.replace("CA C  SING", "CA CX SING");
        assert!(matches!(read(&text).unwrap_err(), CifError::UnknownAtom(name) if name == "CX"));
    }

    #[test]
    fn duplicate_names_without_ordinals_are_ambiguous() {
        let text = GLYCINE_LIKE.replace("GLX C   C 0", "GLX CA  C 0");
        assert!(matches!(read(&text).unwrap_err(), CifError::AmbiguousAtom(name) if name == "CA"));
    }

    #[test]
    fn write_then_read_preserves_types_charges_and_ordinal_bonds() {
        let mut s = read(GLYCINE_LIKE).unwrap();
        s.atom_at_mut(1).unwrap().atom_type = "c3".to_string();
        s.atom_at_mut(1).unwrap().partial_charge = -0.125;
        // Duplicate names survive because bonds are written with atom ordinals.
        s.atom_at_mut(2).unwrap().name = "CA".to_string();

        let mut buffer = Vec::new();
        CifFile::write_to(&s, &mut buffer).unwrap();
        let back = read(std::str::from_utf8(&buffer).unwrap()).unwrap();

        assert_eq!(back.len(), 4);
        assert_eq!(back.bonded_index_pairs(), s.bonded_index_pairs());
        let ca = back.atom_at(1).unwrap();
        assert_eq!(ca.atom_type, "c3");
        assert!((ca.partial_charge + 0.125).abs() < 1e-9);
        assert_eq!(back.atom_at(0).unwrap().formal_charge, 1);
        assert_eq!(back.atom_at(3).unwrap().name, "O1'");
        assert_eq!(back.atom_at(3).unwrap().atom_type, "");
    }

    #[test]
    fn single_atom_category_written_as_items_is_read() {
        let text = "data_NA\n_chem_comp_atom.comp_id NA\n_chem_comp_atom.atom_id NA\n\
                    _chem_comp_atom.type_symbol NA\n_chem_comp_atom.charge 1\n\
                    _chem_comp_atom.model_Cartn_x 0.0\n_chem_comp_atom.model_Cartn_y 0.0\n\
                    _chem_comp_atom.model_Cartn_z 0.0\n";
        let s = read(text).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.atom_at(0).unwrap().element, "Na");
        assert_eq!(s.net_formal_charge(), 1);
    }
}
