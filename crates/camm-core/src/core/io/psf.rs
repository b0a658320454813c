//! PSF topology files and their conversion into force-field templates.
//!
//! Only the header and the `!NATOM` block are interpreted. Every other line is
//! carried through verbatim, so a template rendered with the original charges
//! reproduces the input topology.

use super::paramconf::Seed;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PsfError {
    #[error("Not a PSF file (header = '{0}')")]
    InvalidHeader(String),
    #[error("No !NATOM section found")]
    MissingAtomSection,
    #[error("Invalid atom count in '{0}'")]
    InvalidAtomCount(String),
    #[error("Atom section ended after {found} of {expected} atoms")]
    TruncatedAtomSection { expected: usize, found: usize },
    #[error("Malformed atom line {line}: '{content}'")]
    MalformedAtom { line: usize, content: String },
}

/// Column layout of the atom records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsfFormat {
    /// CHARMM fixed columns, charge in columns 35-48.
    Standard,
    /// CHARMM `EXT` fixed columns, charge in columns 53-66.
    Extended,
    /// NAMD/VMD whitespace-separated fields.
    Namd,
}

impl PsfFormat {
    /// Determines the layout from the first line of the file.
    pub fn detect(header: &str) -> Result<Self, PsfError> {
        let Some(flags) = header.strip_prefix("PSF") else {
            return Err(PsfError::InvalidHeader(header.trim_end().to_string()));
        };
        let flags: Vec<&str> = flags.split_whitespace().collect();
        Ok(if flags.contains(&"NAMD") {
            PsfFormat::Namd
        } else if flags.contains(&"EXT") {
            PsfFormat::Extended
        } else {
            PsfFormat::Standard
        })
    }

    /// Byte range of the charge column for fixed-column layouts.
    fn charge_columns(self) -> Option<(usize, usize)> {
        match self {
            PsfFormat::Standard => Some((34, 48)),
            PsfFormat::Extended => Some((52, 66)),
            PsfFormat::Namd => None,
        }
    }
}

impl fmt::Display for PsfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PsfFormat::Standard => "STANDARD",
            PsfFormat::Extended => "EXTENDED",
            PsfFormat::Namd => "NAMD",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub id: usize,
    pub segid: String,
    pub resid: String,
    pub resname: String,
    pub name: String,
    pub atom_type: String,
}

impl Atom {
    fn parse(line: &str, number: usize) -> Result<Self, PsfError> {
        let malformed = || PsfError::MalformedAtom {
            line: number,
            content: line.trim_end().to_string(),
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            return Err(malformed());
        }
        Ok(Self {
            id: fields[0].parse().map_err(|_| malformed())?,
            segid: fields[1].to_string(),
            resid: fields[2].to_string(),
            resname: fields[3].to_string(),
            name: fields[4].to_string(),
            atom_type: fields[5].to_string(),
        })
    }

    /// Atoms are of the same type when segment, atom name and residue name agree.
    pub fn same_type(&self, other: &Atom) -> bool {
        self.segid == other.segid && self.name == other.name && self.resname == other.resname
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Psf {
    pub format: PsfFormat,
    /// Every line up to and including the `!NATOM` header.
    preamble: String,
    atom_lines: Vec<String>,
    pub atoms: Vec<Atom>,
    /// Every line following the atom records.
    remainder: String,
}

impl Psf {
    pub fn parse(text: &str) -> Result<Self, PsfError> {
        let mut lines = text.split_inclusive('\n').enumerate();
        let header = lines.next().map(|(_, l)| l).unwrap_or_default();
        let format = PsfFormat::detect(header)?;

        let mut preamble = header.to_string();
        let count = loop {
            let Some((_, line)) = lines.next() else {
                return Err(PsfError::MissingAtomSection);
            };
            preamble.push_str(line);
            if line.contains("!NATOM") {
                break line
                    .split_whitespace()
                    .next()
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| PsfError::InvalidAtomCount(line.trim_end().to_string()))?;
            }
        };

        let mut atom_lines = Vec::with_capacity(count);
        let mut atoms = Vec::with_capacity(count);
        for _ in 0..count {
            let Some((idx, line)) = lines.next() else {
                return Err(PsfError::TruncatedAtomSection {
                    expected: count,
                    found: atoms.len(),
                });
            };
            atoms.push(Atom::parse(line, idx + 1)?);
            atom_lines.push(line.to_string());
        }

        let remainder = lines.map(|(_, l)| l).collect();
        debug!("Parsed {} PSF with {} atoms", format, atoms.len());
        Ok(Self {
            format,
            preamble,
            atom_lines,
            atoms,
            remainder,
        })
    }

    /// Rebuilds the topology text, replacing the charge of every atom matched by
    /// a seed with a `_NAME_(FORMAT)` placeholder.
    ///
    /// An atom matches a seed when it is the seed atom itself or, for extending
    /// seeds, when it has the seed atom's type. The first matching seed wins.
    /// Seeds referring to atoms absent from the topology are skipped.
    pub fn to_template(&self, seeds: &[Seed]) -> Result<String, PsfError> {
        let anchors: Vec<(&Seed, &Atom)> = seeds
            .iter()
            .filter_map(|seed| match self.atoms.iter().find(|a| a.id == seed.atom) {
                Some(atom) => Some((seed, atom)),
                None => {
                    warn!("Seed atom {} for '{}' is not in the topology; skipping.", seed.atom, seed.name);
                    None
                }
            })
            .collect();

        let mut text = self.preamble.clone();
        let mut replaced = 0usize;
        for (index, (atom, line)) in self.atoms.iter().zip(&self.atom_lines).enumerate() {
            let hit = anchors
                .iter()
                .find(|(seed, anchor)| atom.id == anchor.id || (seed.extend && atom.same_type(anchor)));
            match hit {
                Some((seed, _)) => {
                    text.push_str(&self.insert_placeholder(line, &seed.name, index)?);
                    replaced += 1;
                }
                None => text.push_str(line),
            }
        }
        text.push_str(&self.remainder);
        debug!("Inserted {} charge placeholders", replaced);
        Ok(text)
    }

    fn insert_placeholder(&self, line: &str, name: &str, index: usize) -> Result<String, PsfError> {
        let malformed = || PsfError::MalformedAtom {
            line: self.preamble.lines().count() + index + 1,
            content: line.trim_end().to_string(),
        };
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };

        match self.format.charge_columns() {
            Some((start, end)) => {
                let (Some(head), Some(tail)) = (body.get(..start), body.get(end..)) else {
                    return Err(malformed());
                };
                Ok(format!("{head}_{name}_(%-14.6f){tail}{newline}"))
            }
            None => {
                let mut fields: Vec<String> = body.split_whitespace().map(str::to_string).collect();
                let charge = fields.get_mut(6).ok_or_else(malformed)?;
                *charge = format!("_{name}_(%f)");
                Ok(format!("{}{newline}", fields.join(" ")))
            }
        }
    }
}
