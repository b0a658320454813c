//! Parameter configuration tables.
//!
//! A comma-separated file declaring which force-field charges are fitted:
//!
//! ```text
//! #name, tie, iatom, extend, minimum, init, maximum, tolerance
//! FF1, , 930, 1, 0.30, 0.45, 0.60, 0.01
//! FF2, 2*FF1, 931, 1
//! ```
//!
//! A row with an empty tie declares a free parameter and must carry its four
//! numeric bounds; a row with a tie declares a tied parameter and needs nothing
//! past `extend`. The same name may appear on several rows to seed it on several
//! atoms; the first row naming a parameter defines it.

use super::traits::DocumentFile;
use crate::core::params::parameter::{Bounds, Parameter, ParameterError, ParameterSet};
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ParamConfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid parameter declaration: {0}")]
    Parameter(#[from] ParameterError),
    #[error("Line {line}: missing field '{field}'")]
    MissingField { line: u64, field: &'static str },
    #[error("Line {line}: invalid value '{value}' for field '{field}'")]
    InvalidField {
        line: u64,
        field: &'static str,
        value: String,
    },
}

/// An atom whose charge a parameter replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub name: String,
    /// One-based atom index in the topology.
    pub atom: usize,
    /// Whether atoms of the same type as the seed take the parameter too.
    pub extend: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamConf {
    pub params: ParameterSet,
    pub seeds: Vec<Seed>,
}

const COLUMNS: [&str; 8] = [
    "name",
    "tie",
    "iatom",
    "extend",
    "minimum",
    "init",
    "maximum",
    "tolerance",
];

impl DocumentFile for ParamConf {
    type Error = ParamConfError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut conf = ParamConf::default();
        for record in csv.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line());
            if record.iter().all(str::is_empty) {
                continue;
            }
            let row = Row { record: &record, line };

            let name = row.required(0)?;
            let atom: usize = row.parsed(2)?;
            let extend: u8 = row.parsed(3)?;
            conf.seeds.push(Seed {
                name: name.to_string(),
                atom,
                extend: extend != 0,
            });

            if conf.params.contains(name) {
                debug!("Parameter '{}' already declared; line {} only adds a seed.", name, line);
                continue;
            }
            let param = match row.optional(1) {
                Some(tie) => Parameter::tied(name, tie),
                None => Parameter::free(
                    name,
                    Bounds {
                        minimum: Some(row.parsed(4)?),
                        init: Some(row.parsed(5)?),
                        maximum: Some(row.parsed(6)?),
                        tolerance: Some(row.parsed(7)?),
                    },
                ),
            };
            conf.params.insert(param)?;
        }
        Ok(conf)
    }

    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "#{}", COLUMNS.join(", "))?;
        for seed in &self.seeds {
            let Some(param) = self.params.get(&seed.name) else {
                continue;
            };
            let extend = u8::from(seed.extend);
            match (param.tie_expression(), param.bounds()) {
                (Some(tie), _) => writeln!(writer, "{}, {}, {}, {}", seed.name, tie, seed.atom, extend)?,
                (None, Some(b)) => writeln!(
                    writer,
                    "{}, , {}, {}, {}, {}, {}, {}",
                    seed.name,
                    seed.atom,
                    extend,
                    display(b.minimum),
                    display(b.init),
                    display(b.maximum),
                    display(b.tolerance)
                )?,
                (None, None) => writeln!(writer, "{}, , {}, {}", seed.name, seed.atom, extend)?,
            }
        }
        Ok(())
    }
}

fn display(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

struct Row<'a> {
    record: &'a csv::StringRecord,
    line: u64,
}

impl Row<'_> {
    fn optional(&self, index: usize) -> Option<&str> {
        self.record.get(index).filter(|field| !field.is_empty())
    }

    fn required(&self, index: usize) -> Result<&str, ParamConfError> {
        self.optional(index).ok_or(ParamConfError::MissingField {
            line: self.line,
            field: COLUMNS[index],
        })
    }

    fn parsed<T: std::str::FromStr>(&self, index: usize) -> Result<T, ParamConfError> {
        let raw = self.required(index)?;
        raw.parse().map_err(|_| ParamConfError::InvalidField {
            line: self.line,
            field: COLUMNS[index],
            value: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CONF: &str = "#name, tie, iatom, extend, minimum, init, maximum, tolerance
FF1, , 930, 1, 0.30, 0.45, 0.60, 0.01
FF2, 2*FF1, 931, 1

# hydrogen of a second residue
FF1, , 950, 0, 0.0, 0.0, 0.0, 0.0
";

    fn read(text: &str) -> Result<ParamConf, ParamConfError> {
        ParamConf::read_from(&mut Cursor::new(text))
    }

    #[test]
    fn reads_free_and_tied_parameters_with_their_seeds() {
        let conf = read(CONF).unwrap();
        assert_eq!(conf.params.len(), 2);

        let ff1 = conf.params.get("FF1").unwrap();
        let bounds = ff1.bounds().unwrap();
        assert_eq!(bounds.minimum, Some(0.30));
        assert_eq!(bounds.init, Some(0.45));
        assert_eq!(bounds.maximum, Some(0.60));
        assert_eq!(bounds.tolerance, Some(0.01));
        assert_eq!(conf.params.get("FF2").unwrap().tie_expression(), Some("2*FF1"));

        assert_eq!(
            conf.seeds,
            vec![
                Seed { name: "FF1".into(), atom: 930, extend: true },
                Seed { name: "FF2".into(), atom: 931, extend: true },
                Seed { name: "FF1".into(), atom: 950, extend: false },
            ]
        );
    }

    #[test]
    fn free_parameter_without_bounds_is_rejected() {
        let err = read("#header\nFF1, , 930, 1, 0.3\n").unwrap_err();
        assert!(matches!(err, ParamConfError::MissingField { field: "init", .. }));
    }

    #[test]
    fn non_numeric_atom_index_is_rejected() {
        let err = read("#header\nFF1, , abc, 1, 0.3, 0.4, 0.5, 0.1\n").unwrap_err();
        assert!(matches!(
            err,
            ParamConfError::InvalidField { field: "iatom", ref value, .. } if value == "abc"
        ));
    }

    #[test]
    fn written_table_reads_back_identically() {
        let conf = read(CONF).unwrap();
        let mut out = Vec::new();
        conf.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("#name, tie, iatom"));
        assert_eq!(read(&text).unwrap(), conf);
    }
}
