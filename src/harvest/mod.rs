//! Harvest module - pagination and bounded fan-out
//!
//! This module contains the moving parts of a harvest run:
//! - The [`Connector`] contract every source implements
//! - [`FanOut`], the one primitive bounding concurrent fetches
//! - [`Orchestrator`], the page cursor loop persisting each page
//! - [`SelectorConnector`], a source described purely by configuration

mod connector;
mod fanout;
mod orchestrator;
mod selector_connector;

pub use connector::{AggregateError, Connector, ConnectorError, Page, TaskFailure};
pub use fanout::{FanOut, FanOutResult, DEFAULT_CONCURRENCY};
pub use orchestrator::{HarvestSummary, Orchestrator};
pub use selector_connector::SelectorConnector;
