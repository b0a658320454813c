use indexmap::IndexMap;
use thiserror::Error;

/// Search window and starting point of a free parameter.
///
/// Every field is optional because templates written by hand often declare only
/// the name of a free parameter and leave the bounds to the optimizer input file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub init: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub tolerance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    /// Value supplied directly by the optimizer.
    Free(Bounds),
    /// Value computed from free parameters, e.g. `2*FF1`.
    Tied { expression: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    kind: ParameterKind,
    value: Option<f64>,
}

impl Parameter {
    pub fn free(name: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Free(bounds),
            value: None,
        }
    }

    pub fn tied(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Tied {
                expression: expression.into(),
            },
            value: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = Some(value);
    }

    pub fn is_free(&self) -> bool {
        matches!(self.kind, ParameterKind::Free(_))
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        match &self.kind {
            ParameterKind::Free(bounds) => Some(bounds),
            ParameterKind::Tied { .. } => None,
        }
    }

    pub fn tie_expression(&self) -> Option<&str> {
        match &self.kind {
            ParameterKind::Free(_) => None,
            ParameterKind::Tied { expression } => Some(expression),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("Parameter '{0}' is declared more than once")]
    Duplicate(String),
    #[error("Parameter name cannot be empty")]
    EmptyName,
}

/// The parameters declared by one force-field template, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    params: IndexMap<String, Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if param.name.trim().is_empty() {
            return Err(ParameterError::EmptyName);
        }
        if self.params.contains_key(&param.name) {
            return Err(ParameterError::Duplicate(param.name));
        }
        self.params.insert(param.name.clone(), param);
        Ok(())
    }

    pub fn try_from_iter(
        params: impl IntoIterator<Item = Parameter>,
    ) -> Result<Self, ParameterError> {
        let mut set = Self::new();
        for param in params {
            set.insert(param)?;
        }
        Ok(set)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }

    pub fn free(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values().filter(|p| p.is_free())
    }

    pub fn tied(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values().filter(|p| !p.is_free())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = indexmap::map::Values<'a, String, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> ParameterSet {
        ParameterSet::try_from_iter([
            Parameter::free(
                "FF1",
                Bounds {
                    init: Some(0.45),
                    minimum: Some(0.30),
                    maximum: Some(0.60),
                    tolerance: Some(0.01),
                },
            ),
            Parameter::tied("FF2", "2*FF1"),
            Parameter::free("FF3", Bounds::default()),
        ])
        .unwrap()
    }

    #[test]
    fn free_and_tied_partition_keeps_declaration_order() {
        let set = sample_set();
        let free: Vec<_> = set.free().map(Parameter::name).collect();
        let tied: Vec<_> = set.tied().map(Parameter::name).collect();
        assert_eq!(free, vec!["FF1", "FF3"]);
        assert_eq!(tied, vec!["FF2"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut set = sample_set();
        let err = set.insert(Parameter::tied("FF1", "3*FF3")).unwrap_err();
        assert_eq!(err, ParameterError::Duplicate("FF1".to_string()));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut set = ParameterSet::new();
        assert_eq!(
            set.insert(Parameter::free("  ", Bounds::default())),
            Err(ParameterError::EmptyName)
        );
    }

    #[test]
    fn accessors_expose_kind_specific_data() {
        let set = sample_set();
        let ff1 = set.get("FF1").unwrap();
        assert!(ff1.is_free());
        assert_eq!(ff1.bounds().and_then(|b| b.init), Some(0.45));
        assert_eq!(ff1.tie_expression(), None);

        let ff2 = set.get("FF2").unwrap();
        assert!(!ff2.is_free());
        assert_eq!(ff2.tie_expression(), Some("2*FF1"));
        assert!(ff2.bounds().is_none());
    }

    #[test]
    fn set_value_updates_parameter() {
        let mut set = sample_set();
        set.get_mut("FF3").unwrap().set_value(1.5);
        assert_eq!(set.get("FF3").unwrap().value(), Some(1.5));
        assert_eq!(set.get("FF1").unwrap().value(), None);
    }
}
