//! Body template rendering.

pub mod engine;

pub use engine::{SimpleTemplateRenderer, TemplateRenderer};
