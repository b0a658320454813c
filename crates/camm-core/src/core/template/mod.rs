//! Template rendering.
//!
//! Templates are plain text carrying placeholders of the form `_NAME_(FORMAT)`,
//! where `FORMAT` is a C-style numeric conversion such as `%-14.6f`. Rendering
//! replaces each placeholder with the named parameter's value formatted accordingly.

pub mod cformat;
pub mod render;

pub use cformat::CFormat;
pub use render::{Placeholder, placeholders, render};
