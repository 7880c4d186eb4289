//! Formatting helpers for rendering expressions and closed forms.

pub mod expr;

pub use expr::pretty;
