use super::cformat::CFormat;
use indexmap::IndexMap;
use tracing::trace;

/// A `_NAME_(FORMAT)` occurrence found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub spec: String,
}

/// Substitutes every placeholder bound to a name in `values`.
///
/// For each value, the distinct format specifications used with that name are
/// collected first, then every `_NAME_(SPEC)` occurrence is replaced with the value
/// formatted per `SPEC`. Placeholders naming no value, or carrying a specification
/// that is not a numeric conversion, are left untouched so that partially rendered
/// templates can be completed by a later stage.
pub fn render(template: &str, values: &IndexMap<String, f64>) -> String {
    let mut text = template.to_string();
    for (name, &value) in values {
        for (spec, format) in formats_for(&text, name) {
            let placeholder = format!("_{name}_({spec})");
            let formatted = format.format(value);
            trace!("Substituting {} -> '{}'", placeholder, formatted);
            text = text.replace(&placeholder, &formatted);
        }
    }
    text
}

/// Distinct, valid format specifications attached to `name` in `text`.
fn formats_for(text: &str, name: &str) -> IndexMap<String, CFormat> {
    let prefix = format!("_{name}_(");
    let mut formats = IndexMap::new();
    for (idx, _) in text.match_indices(&prefix) {
        let rest = &text[idx + prefix.len()..];
        let Some(close) = rest.find(')') else {
            continue;
        };
        let spec = &rest[..close];
        if formats.contains_key(spec) {
            continue;
        }
        if let Ok(format) = spec.parse::<CFormat>() {
            formats.insert(spec.to_string(), format);
        }
    }
    formats
}

/// Lists the well-formed placeholders remaining in `text`, in order of appearance.
///
/// A placeholder's name is the run of identifier characters between the opening
/// underscore and the `_(` that introduces the format.
pub fn placeholders(text: &str) -> Vec<Placeholder> {
    let mut found = Vec::new();
    for (idx, _) in text.match_indices("_(") {
        let rest = &text[idx + 2..];
        let Some(close) = rest.find(')') else {
            continue;
        };
        let spec = &rest[..close];
        if spec.parse::<CFormat>().is_err() {
            continue;
        }

        let head = &text[..idx];
        let run_start = head
            .char_indices()
            .rev()
            .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let run = &head[run_start..];
        let Some(underscore) = run.find('_') else {
            continue;
        };
        let name = &run[underscore + 1..];
        if name.is_empty() {
            continue;
        }
        found.push(Placeholder {
            name: name.to_string(),
            spec: spec.to_string(),
        });
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64)]) -> IndexMap<String, f64> {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn substitutes_placeholder_with_formatted_value() {
        let out = render("_FF1_(%-14.6f)", &values(&[("FF1", 0.45)]));
        assert_eq!(out, "0.450000      ");
    }

    #[test]
    fn distinct_formats_for_one_name_are_substituted_independently() {
        let template = "a=_FF1_(%.2f) b=_FF1_(%e) c=_FF1_(%.2f)";
        let out = render(template, &values(&[("FF1", 0.45)]));
        assert_eq!(out, "a=0.45 b=4.500000e-01 c=0.45");
    }

    #[test]
    fn unknown_placeholders_are_left_verbatim() {
        let template = "_UNKNOWN_(%f) _FF1_(%f)";
        let out = render(template, &values(&[("FF1", 1.0)]));
        assert_eq!(out, "_UNKNOWN_(%f) 1.000000");
    }

    #[test]
    fn invalid_format_specifications_are_left_verbatim() {
        let out = render("_FF1_(%s) _FF1_(%q", &values(&[("FF1", 1.0)]));
        assert_eq!(out, "_FF1_(%s) _FF1_(%q");
    }

    #[test]
    fn names_sharing_a_prefix_are_kept_apart() {
        let template = "_FF1_(%.1f) _FF10_(%.1f)";
        let out = render(template, &values(&[("FF1", 1.0), ("FF10", 10.0)]));
        assert_eq!(out, "1.0 10.0");
    }

    #[test]
    fn rendering_is_idempotent_once_every_placeholder_is_bound() {
        let template = "ATOM _A_(%-14.6f) _B_(%8.3f)\nATOM _A_(%g)\n";
        let vals = values(&[("A", -0.834), ("B", 0.417)]);
        let once = render(template, &vals);
        let twice = render(&once, &vals);
        assert_eq!(once, twice);
        assert!(placeholders(&once).is_empty());
    }

    #[test]
    fn placeholders_are_listed_with_their_specs() {
        let text = "  1 SEG _OW_(%-14.6f) x_H_W_(%f) _LEFT_(%s) _(%f)";
        let found = placeholders(text);
        assert_eq!(
            found,
            vec![
                Placeholder {
                    name: "OW".to_string(),
                    spec: "%-14.6f".to_string()
                },
                Placeholder {
                    name: "H_W".to_string(),
                    spec: "%f".to_string()
                },
            ]
        );
    }
}
