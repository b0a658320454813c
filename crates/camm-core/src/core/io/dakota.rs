//! Files exchanged with the Dakota optimizer.
//!
//! Dakota hands each function evaluation a parameters file in its standard format,
//!
//! ```text
//!                                           2 variables
//!                       4.500000000000000e-01 FF1
//!                       1.000000000000000e-08 b0
//!                                           1 functions
//!                                           1 ASV_1:r1
//! ```
//!
//! and expects the analysis driver to answer with a results file holding the cost
//! function. Only the variables block is read; the sections that follow it are
//! ignored.

use crate::core::params::parameter::{Bounds, Parameter, ParameterSet};
use crate::core::template::cformat::exponent_notation;
use indexmap::IndexMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DakotaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parameters file is empty")]
    Empty,
    #[error("Invalid variables header on line {line}: '{content}'")]
    InvalidHeader { line: usize, content: String },
    #[error("Invalid variable on line {line}: '{content}'")]
    InvalidVariable { line: usize, content: String },
    #[error("Parameters file ended after {found} of {expected} variables")]
    Truncated { expected: usize, found: usize },
    #[error("Free parameter '{name}' has no {field} value")]
    MissingBound { name: String, field: &'static str },
}

/// Reads the variables block of a Dakota parameters file.
///
/// The returned map keeps the order in which Dakota listed the variables.
pub fn read_params(reader: &mut impl BufRead) -> Result<IndexMap<String, f64>, DakotaError> {
    let mut lines = reader.lines().enumerate();

    let count = loop {
        let Some((idx, line)) = lines.next() else {
            return Err(DakotaError::Empty);
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        break parse_header(&line, idx + 1)?;
    };

    let mut values = IndexMap::with_capacity(count);
    for _ in 0..count {
        let Some((idx, line)) = lines.next() else {
            return Err(DakotaError::Truncated {
                expected: count,
                found: values.len(),
            });
        };
        let line = line?;
        let invalid = || DakotaError::InvalidVariable {
            line: idx + 1,
            content: line.clone(),
        };
        let mut fields = line.split_whitespace();
        let value = fields
            .next()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(invalid)?;
        let name = fields.next().ok_or_else(invalid)?;
        values.insert(name.to_string(), value);
    }
    Ok(values)
}

/// Parses the variables block of a parameters file held in memory.
pub fn parse_params(text: &str) -> Result<IndexMap<String, f64>, DakotaError> {
    read_params(&mut text.as_bytes())
}

/// Rewrites a parameters file with every variable multiplied by `factor`.
///
/// Values are written in Dakota's own layout; all other lines are kept as they are.
pub fn scale_params(text: &str, factor: f64) -> Result<String, DakotaError> {
    let count = parse_params(text)?.len();
    let mut scaled = String::with_capacity(text.len());
    let mut remaining = None;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        match remaining {
            None if !line.trim().is_empty() => {
                remaining = Some(count);
                scaled.push_str(line);
            }
            Some(n) if n > 0 => {
                remaining = Some(n - 1);
                let mut fields = line.split_whitespace();
                let (Some(Ok(value)), Some(name)) =
                    (fields.next().map(str::parse::<f64>), fields.next())
                else {
                    return Err(DakotaError::InvalidVariable {
                        line: idx + 1,
                        content: line.trim_end().to_string(),
                    });
                };
                let newline = if line.ends_with('\n') { "\n" } else { "" };
                scaled.push_str(&format!(
                    "{:>43} {name}{newline}",
                    dakota_number(value * factor)
                ));
            }
            _ => scaled.push_str(line),
        }
    }
    Ok(scaled)
}

fn dakota_number(value: f64) -> String {
    let magnitude = exponent_notation(value.abs(), 15, false);
    if value.is_sign_negative() && value != 0.0 {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

fn parse_header(line: &str, number: usize) -> Result<usize, DakotaError> {
    let mut fields = line.split_whitespace();
    match (fields.next().map(str::parse::<usize>), fields.next()) {
        (Some(Ok(count)), Some("variables")) => Ok(count),
        _ => Err(DakotaError::InvalidHeader {
            line: number,
            content: line.to_string(),
        }),
    }
}

/// Writes a results file holding a single cost function value.
pub fn write_results(writer: &mut impl Write, cost_function: f64) -> io::Result<()> {
    writeln!(writer, "{cost_function:.6}")
}

/// Dakota input used when no template is supplied: a least-squares calibration
/// driven through a forked analysis driver.
pub const DEFAULT_INPUT_TEMPLATE: &str = "
# DAKOTA INPUT FILE: nohup dakota dakota.in &

method,
        nl2sol
          initial_trust_radius = 100
          function_precision = 1e-3
          output debug

variables,
        continuous_design = _NVAR_
          cdv_initial_point _INITIAL_POINT_
          cdv_lower_bounds  _LOWER_BOUNDS_
          cdv_upper_bounds  _UPPER_BOUNDS_
          cdv_descriptors   _DESCRIPTORS_

interface,
        fork
          analysis_driver = 'opt_driver'
            parameters_file = 'params.in'
            results_file = 'results.out'
            file_tag
            file_save

responses,
        calibration_terms = 1500
        analytic_gradients
        no_hessians
";

/// Fills the variables section of a Dakota input template from the free parameters.
///
/// Free parameters are listed alphabetically by name. Recognized fields are
/// `_NVAR_`, `_DESCRIPTORS_`, `_INITIAL_POINT_`, `_LOWER_BOUNDS_`,
/// `_UPPER_BOUNDS_` and `_MAX_STEP_`. A bound is only required when the template
/// references the field that lists it.
pub fn populate_variables(template: &str, params: &ParameterSet) -> Result<String, DakotaError> {
    let mut free: Vec<(&Parameter, &Bounds)> = params
        .free()
        .filter_map(|p| p.bounds().map(|b| (p, b)))
        .collect();
    free.sort_by(|a, b| a.0.name().cmp(b.0.name()));

    let mut text = template.replace("_NVAR_", &free.len().to_string());
    let descriptors: Vec<String> = free.iter().map(|(p, _)| format!("'{}'", p.name())).collect();
    text = text.replace("_DESCRIPTORS_", &tab_joined(&descriptors));

    let fields: [(&str, &'static str, fn(&Bounds) -> Option<f64>); 4] = [
        ("_INITIAL_POINT_", "init", |b| b.init),
        ("_LOWER_BOUNDS_", "minimum", |b| b.minimum),
        ("_UPPER_BOUNDS_", "maximum", |b| b.maximum),
        ("_MAX_STEP_", "tolerance", |b| b.tolerance),
    ];
    for (placeholder, field, extract) in fields {
        if !text.contains(placeholder) {
            continue;
        }
        let values = free
            .iter()
            .map(|(p, b)| {
                extract(b)
                    .map(|v| v.to_string())
                    .ok_or_else(|| DakotaError::MissingBound {
                        name: p.name().to_string(),
                        field,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        text = text.replace(placeholder, &tab_joined(&values));
    }
    Ok(text)
}

fn tab_joined(items: &[String]) -> String {
    format!("\t{}", items.join("\t"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &str = "                                          2 variables
                      4.500000000000000e-01 FF1
                      1.000000000000000e-08 b0
                                          1 functions
                                          1 ASV_1:r1
";

    #[test]
    fn scaling_rewrites_only_the_variables_block() {
        let scaled = scale_params(PARAMS, 1.01).unwrap();
        let lines: Vec<&str> = scaled.lines().collect();
        assert_eq!(lines[0], PARAMS.lines().next().unwrap());
        assert_eq!(lines[1], "                      4.545000000000000e-01 FF1");
        assert_eq!(lines[2], "                      1.010000000000000e-08 b0");
        assert_eq!(&lines[3..], &PARAMS.lines().skip(3).collect::<Vec<_>>()[..]);
        assert!(scaled.ends_with('\n'));

        let values = parse_params(&scale_params(PARAMS, -0.5).unwrap()).unwrap();
        assert_eq!(values["FF1"], -0.225);
    }

    #[test]
    fn reads_variables_in_dakota_order() {
        let values = parse_params(PARAMS).unwrap();
        let names: Vec<_> = values.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["FF1", "b0"]);
        assert_eq!(values["FF1"], 0.45);
        assert_eq!(values["b0"], 1e-8);
    }

    #[test]
    fn rejects_a_missing_variables_header() {
        assert!(matches!(
            parse_params("1 functions\n"),
            Err(DakotaError::InvalidHeader { line: 1, .. })
        ));
        assert!(matches!(parse_params("\n\n"), Err(DakotaError::Empty)));
    }

    #[test]
    fn reports_truncated_and_malformed_variable_lines() {
        assert!(matches!(
            parse_params("2 variables\n0.1 a\n"),
            Err(DakotaError::Truncated {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            parse_params("1 variables\nabc a\n"),
            Err(DakotaError::InvalidVariable { line: 2, .. })
        ));
        assert!(matches!(
            parse_params("1 variables\n0.5\n"),
            Err(DakotaError::InvalidVariable { line: 2, .. })
        ));
    }

    #[test]
    fn results_are_written_with_six_decimals() {
        let mut out = Vec::new();
        write_results(&mut out, 3.14).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3.140000\n");
    }

    fn bounded(name: &str, init: f64, min: f64, max: f64) -> Parameter {
        Parameter::free(
            name,
            Bounds {
                init: Some(init),
                minimum: Some(min),
                maximum: Some(max),
                tolerance: None,
            },
        )
    }

    #[test]
    fn variables_are_populated_alphabetically() {
        let params = ParameterSet::try_from_iter([
            bounded("FF2", 0.2, 0.1, 0.3),
            bounded("FF1", 0.45, 0.3, 0.6),
            Parameter::tied("FF3", "2*FF1"),
        ])
        .unwrap();
        let template = "n=_NVAR_\nd=_DESCRIPTORS_\ni=_INITIAL_POINT_\nl=_LOWER_BOUNDS_\nu=_UPPER_BOUNDS_";
        let out = populate_variables(template, &params).unwrap();
        assert_eq!(
            out,
            "n=2\nd=\t'FF1'\t'FF2'\ni=\t0.45\t0.2\nl=\t0.3\t0.1\nu=\t0.6\t0.3"
        );
    }

    #[test]
    fn referenced_missing_bound_is_an_error() {
        let params = ParameterSet::try_from_iter([bounded("FF1", 0.45, 0.3, 0.6)]).unwrap();
        let err = populate_variables("_MAX_STEP_", &params).unwrap_err();
        assert!(matches!(
            err,
            DakotaError::MissingBound { ref name, field: "tolerance" } if name == "FF1"
        ));
        assert!(populate_variables(DEFAULT_INPUT_TEMPLATE, &params).is_ok());
    }
}
