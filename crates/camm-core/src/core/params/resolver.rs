use super::expr::{Expr, ExprError};
use super::parameter::ParameterSet;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Concrete value of every parameter, free parameters first in optimizer order,
/// then tied parameters in declaration order.
pub type ResolvedValues = IndexMap<String, f64>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error(
        "Tie expression of '{parameter}' references '{reference}', which is not a resolved free parameter"
    )]
    UnresolvedReference { parameter: String, reference: String },

    #[error("Failed to evaluate tie expression '{expression}' of '{parameter}': {source}")]
    Evaluation {
        parameter: String,
        expression: String,
        #[source]
        source: ExprError,
    },

    #[error("No value supplied for free parameter '{0}'")]
    MissingValue(String),
}

/// Computes a value for every parameter of `params`.
///
/// Free parameters take their value from `free_values` (falling back to a value
/// already stored on the parameter), in the order the optimizer reported them.
/// Tied parameters are then evaluated against the free values only: a tie that
/// references another tied parameter, or an undeclared name, is an
/// [`ResolveError::UnresolvedReference`]. Any failure aborts the whole resolution.
pub fn resolve(
    params: &ParameterSet,
    free_values: &IndexMap<String, f64>,
) -> Result<ResolvedValues, ResolveError> {
    let mut resolved = ResolvedValues::with_capacity(params.len());

    for (name, value) in free_values {
        match params.get(name) {
            Some(param) if param.is_free() => {
                resolved.insert(name.clone(), *value);
            }
            Some(_) => warn!(
                "Ignoring optimizer value for '{}': it is a tied parameter.",
                name
            ),
            None => debug!("Optimizer variable '{}' is not a template parameter.", name),
        }
    }

    for param in params.free() {
        if resolved.contains_key(param.name()) {
            continue;
        }
        let value = param
            .value()
            .ok_or_else(|| ResolveError::MissingValue(param.name().to_string()))?;
        resolved.insert(param.name().to_string(), value);
    }
    let free_count = resolved.len();

    for param in params.tied() {
        let expression = param.tie_expression().unwrap_or_default();
        let value = evaluate_tie(param.name(), expression, &resolved, free_count)?;
        debug!("Resolved tie {} = {} -> {}", param.name(), expression, value);
        resolved.insert(param.name().to_string(), value);
    }

    Ok(resolved)
}

fn evaluate_tie(
    name: &str,
    expression: &str,
    resolved: &ResolvedValues,
    free_count: usize,
) -> Result<f64, ResolveError> {
    let evaluation_error = |source| ResolveError::Evaluation {
        parameter: name.to_string(),
        expression: expression.to_string(),
        source,
    };

    let expr = Expr::parse(expression).map_err(evaluation_error)?;

    // Only the leading `free_count` entries are free parameters.
    let free_value = |reference: &str| {
        resolved
            .get_index_of(reference)
            .filter(|&index| index < free_count)
            .map(|index| resolved[index])
    };

    if let Some(reference) = expr.names().into_iter().find(|r| free_value(r).is_none()) {
        return Err(ResolveError::UnresolvedReference {
            parameter: name.to_string(),
            reference: reference.to_string(),
        });
    }

    expr.eval(&free_value).map_err(evaluation_error)
}
