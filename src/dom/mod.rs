//! DOM query module
//!
//! This module provides the selector primitive connectors use to locate
//! repeated items inside arbitrary markup:
//! - Typed selectors with structured construction errors
//! - The two-phase sibling search over a parsed `scraper` tree
//! - Path helpers and text extraction

mod query;
mod selector;
mod tags;

pub use query::{attr_of, find, find_all, first, text_of, DomQuery, Find};
pub use selector::{ClassPredicate, Selector, SelectorPath};
