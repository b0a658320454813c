//! Force-field template files.
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <root>
//!   <!-- Force field template file -->
//!   <FFParams>
//!     <FFParam name="FF1" init="0.45" minimum="0.3" maximum="0.6" tolerance="0.01"/>
//!     <FFParam name="FF2" tie="2*FF1"/>
//!   </FFParams>
//!   <FFTemplate><![CDATA[ ... text with _FF1_(%-14.6f) placeholders ... ]]></FFTemplate>
//! </root>
//! ```
//!
//! The template text is written as CDATA so that column-sensitive content survives
//! untouched. Files whose template is plain element text are read as well.

use super::traits::DocumentFile;
use crate::core::params::parameter::{Bounds, Parameter, ParameterError, ParameterSet};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::Deserialize;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FftplError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("Invalid parameter declaration: {0}")]
    Parameter(#[from] ParameterError),
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(rename = "FFParams", default)]
    params: RawParamList,
    #[serde(rename = "FFTemplate", default)]
    template: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawParamList {
    #[serde(rename = "FFParam", default)]
    entries: Vec<RawParam>,
}

#[derive(Debug, Deserialize)]
struct RawParam {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@tie", default)]
    tie: Option<String>,
    #[serde(rename = "@value", default)]
    value: Option<f64>,
    #[serde(rename = "@init", default)]
    init: Option<f64>,
    #[serde(rename = "@minimum", default)]
    minimum: Option<f64>,
    #[serde(rename = "@maximum", default)]
    maximum: Option<f64>,
    #[serde(rename = "@tolerance", default)]
    tolerance: Option<f64>,
}

impl From<RawParam> for Parameter {
    fn from(raw: RawParam) -> Self {
        let param = match raw.tie.filter(|tie| !tie.trim().is_empty()) {
            Some(tie) => Parameter::tied(raw.name, tie.trim()),
            None => Parameter::free(
                raw.name,
                Bounds {
                    init: raw.init,
                    minimum: raw.minimum,
                    maximum: raw.maximum,
                    tolerance: raw.tolerance,
                },
            ),
        };
        match raw.value {
            Some(value) => param.with_value(value),
            None => param,
        }
    }
}

/// Parameter declarations together with the template text they are rendered into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForcefieldTemplate {
    pub params: ParameterSet,
    pub template: String,
}

impl ForcefieldTemplate {
    pub fn new(params: ParameterSet, template: impl Into<String>) -> Self {
        Self {
            params,
            template: template.into(),
        }
    }
}

impl DocumentFile for ForcefieldTemplate {
    type Error = FftplError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error> {
        let raw: RawDocument = quick_xml::de::from_reader(reader)?;
        let params = ParameterSet::try_from_iter(raw.params.entries.into_iter().map(Into::into))?;
        Ok(Self {
            params,
            template: raw.template,
        })
    }

    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error> {
        let mut xml = Writer::new(writer);
        let newline = |indent: usize| Event::Text(BytesText::from_escaped(format!("\n{}", "  ".repeat(indent))));

        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        xml.write_event(newline(0))?;
        xml.write_event(Event::Start(BytesStart::new("root")))?;
        xml.write_event(newline(1))?;
        xml.write_event(Event::Comment(BytesText::new(" Force field template file ")))?;
        xml.write_event(newline(1))?;

        xml.write_event(Event::Start(BytesStart::new("FFParams")))?;
        for param in &self.params {
            xml.write_event(newline(2))?;
            xml.write_event(Event::Empty(param_element(param)))?;
        }
        xml.write_event(newline(1))?;
        xml.write_event(Event::End(BytesEnd::new("FFParams")))?;
        xml.write_event(newline(1))?;

        xml.write_event(Event::Start(BytesStart::new("FFTemplate")))?;
        for section in cdata_sections(&self.template) {
            xml.write_event(Event::CData(BytesCData::new(section)))?;
        }
        xml.write_event(Event::End(BytesEnd::new("FFTemplate")))?;
        xml.write_event(newline(0))?;
        xml.write_event(Event::End(BytesEnd::new("root")))?;
        xml.write_event(newline(0))?;
        Ok(())
    }
}

fn param_element(param: &Parameter) -> BytesStart<'static> {
    let mut element = BytesStart::new("FFParam");
    element.push_attribute(("name", param.name()));
    if let Some(tie) = param.tie_expression() {
        element.push_attribute(("tie", tie));
    }
    let mut numeric = vec![("value", param.value())];
    if let Some(bounds) = param.bounds() {
        numeric.extend([
            ("init", bounds.init),
            ("minimum", bounds.minimum),
            ("maximum", bounds.maximum),
            ("tolerance", bounds.tolerance),
        ]);
    }
    for (key, value) in numeric {
        if let Some(value) = value {
            element.push_attribute((key, value.to_string().as_str()));
        }
    }
    element
}

/// Splits text so that no CDATA section contains the `]]>` terminator.
fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find("]]>") {
        sections.push(&rest[..idx + 2]);
        rest = &rest[idx + 2..];
    }
    sections.push(rest);
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const PSF_LINES: &str = "PSF EXT\n\n       3 !NATOM\n         1 SOL      1        SOL      OW       OT       _OW_(%-14.6f)  15.9994           0\n";

    fn sample() -> ForcefieldTemplate {
        let params = ParameterSet::try_from_iter([
            Parameter::free(
                "OW",
                Bounds {
                    init: Some(-0.834),
                    minimum: Some(-1.0),
                    maximum: Some(-0.5),
                    tolerance: Some(0.01),
                },
            ),
            Parameter::tied("HW", "-OW/2"),
        ])
        .unwrap();
        ForcefieldTemplate::new(params, PSF_LINES)
    }

    fn write_to_string(doc: &ForcefieldTemplate) -> String {
        let mut out = Vec::new();
        doc.write_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn written_document_reads_back_identically() {
        let doc = sample();
        let xml = write_to_string(&doc);
        assert!(xml.contains("<FFParam name=\"HW\" tie=\"-OW/2\"/>"));
        assert!(xml.contains("<![CDATA[PSF EXT"));

        let read = ForcefieldTemplate::read_from(&mut Cursor::new(xml)).unwrap();
        assert_eq!(read, doc);
    }

    #[test]
    fn reads_attribute_only_parameters_and_plain_text_template() {
        let xml = r#"<?xml version="1.0" ?>
<root>
  <!--Force field template file-->
  <FFParams>
    <FFParam init="0.45" maximum="0.6" minimum="0.3" name="FF1" tolerance="0.01"/>
    <FFParam name="FF2" tie="2*FF1"/>
    <FFParam name="FF3" tie=""/>
  </FFParams>
  <FFTemplate>charge _FF1_(%-14.6f)</FFTemplate>
</root>
"#;
        let doc = ForcefieldTemplate::read_from(&mut Cursor::new(xml)).unwrap();
        assert_eq!(doc.params.len(), 3);
        let ff1 = doc.params.get("FF1").unwrap();
        assert_eq!(ff1.bounds().unwrap().init, Some(0.45));
        assert_eq!(ff1.bounds().unwrap().tolerance, Some(0.01));
        assert_eq!(doc.params.get("FF2").unwrap().tie_expression(), Some("2*FF1"));
        assert!(doc.params.get("FF3").unwrap().is_free());
        assert!(doc.template.contains("_FF1_(%-14.6f)"));
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        let xml = r#"<root><FFParams><FFParam name="A"/><FFParam name="A"/></FFParams><FFTemplate>x</FFTemplate></root>"#;
        let result = ForcefieldTemplate::read_from(&mut Cursor::new(xml));
        assert!(matches!(result, Err(FftplError::Parameter(ParameterError::Duplicate(_)))));
    }

    #[test]
    fn malformed_xml_is_rejected() {
        let result = ForcefieldTemplate::read_from(&mut Cursor::new("<root><FFParams>"));
        assert!(matches!(result, Err(FftplError::Xml(_))));
    }

    #[test]
    fn cdata_terminator_inside_template_survives() {
        let doc = ForcefieldTemplate::new(ParameterSet::new(), "a]]>b");
        let xml = write_to_string(&doc);
        let read = ForcefieldTemplate::read_from(&mut Cursor::new(xml)).unwrap();
        assert_eq!(read.template, "a]]>b");
    }

    #[test]
    fn path_helpers_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fftpl.xml");
        let doc = sample();
        doc.write_to_path(&path).unwrap();
        let read = ForcefieldTemplate::read_from_path(&path).unwrap();
        assert_eq!(read.template, PSF_LINES);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ForcefieldTemplate::read_from_path(dir.path().join("absent.xml"));
        assert!(matches!(result, Err(FftplError::Io(_))));
    }
}
