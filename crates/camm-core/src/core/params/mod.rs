//! Force-field parameters and their constraints.
//!
//! A parameter is either *free*, with its value supplied by the optimizer, or *tied*,
//! with its value computed from free parameters through an arithmetic expression
//! such as `2*FF1`. The [`resolver`] turns optimizer output into a concrete value
//! for every parameter.

pub mod expr;
pub mod parameter;
pub mod resolver;
