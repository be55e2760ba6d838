//! Configuration-driven connector
//!
//! Describes a source entirely through selector paths:
//! - A listing URL template paged with `{page}`, optionally sized with `{limit}`
//! - The path to item links on a listing page
//! - An optional marker that is present while a further page exists
//! - One path per record field on the item page
//!
//! Markup is parsed and dropped before any `.await`; only owned strings cross
//! suspension points.

use crate::config::{parse_path, ConnectorConfig, LIMIT_PLACEHOLDER, PAGE_PLACEHOLDER};
use crate::dom::{attr_of, find_all, first, text_of, SelectorPath};
use crate::harvest::connector::{Connector, ConnectorError, Page};
use crate::harvest::fanout::FanOut;
use crate::record::Record;
use crate::transport::{Exchange, HttpExchange, ResilientTransport, TransportError};
use crate::ConfigResult;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Connector built from a [`ConnectorConfig`]
pub struct SelectorConnector<E = HttpExchange> {
    name: String,
    listing_url: String,
    item_link: SelectorPath,
    next_page: Option<SelectorPath>,
    skip_patterns: Vec<String>,
    detail: Arc<DetailReader<E>>,
    fanout: FanOut,
}

/// Fetches and extracts one item page
///
/// Shared by every fan-out task of a page.
struct DetailReader<E> {
    transport: Arc<ResilientTransport<E>>,
    headers: HeaderMap,
    fields: Vec<(&'static str, SelectorPath)>,
}

/// Links found on one listing page
#[derive(Debug, Default, PartialEq)]
struct Listing {
    links: Vec<String>,
    has_next: bool,
}

impl<E: Exchange + 'static> SelectorConnector<E> {
    /// Builds a connector, parsing every configured selector up front
    pub fn new(
        config: &ConnectorConfig,
        transport: Arc<ResilientTransport<E>>,
        fanout: FanOut,
    ) -> ConfigResult<Self> {
        let fields = config
            .fields
            .iter()
            .map(|(field, path)| parse_path(path).map(|path| (field, path)))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            listing_url: config.listing_url.clone(),
            item_link: parse_path(&config.item_link)?,
            next_page: config.next_page.as_deref().map(parse_path).transpose()?,
            skip_patterns: config.skip_patterns.clone(),
            detail: Arc::new(DetailReader {
                transport,
                headers: config.header_map()?,
                fields,
            }),
            fanout,
        })
    }

    fn listing_url_for(&self, page: u32, limit: u32) -> String {
        self.listing_url
            .replace(PAGE_PLACEHOLDER, &page.to_string())
            .replace(LIMIT_PLACEHOLDER, &limit.to_string())
    }

    /// Extracts item links from a listing page
    ///
    /// Every link is kept. The source decides how many items a page holds;
    /// cutting a page short would lose the rest, since the next call moves on
    /// to the following page.
    fn parse_listing(&self, body: &str, base: &Url) -> Listing {
        let document = Html::parse_document(body);
        let root = document.root_element();

        let mut seen = HashSet::new();
        let links: Vec<String> = find_all(root, &self.item_link)
            .into_iter()
            .filter_map(|element| attr_of(element, "href"))
            .filter_map(|href| match base.join(href) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    tracing::debug!("Skipping unresolvable link {}: {}", href, e);
                    None
                }
            })
            .filter(|link| !self.is_skipped(link))
            .filter(|link| seen.insert(link.clone()))
            .collect();

        let has_next = match &self.next_page {
            Some(marker) => first(root, marker).is_some(),
            None => !links.is_empty(),
        };

        Listing { links, has_next }
    }

    fn is_skipped(&self, link: &str) -> bool {
        let lowered = link.to_lowercase();
        self.skip_patterns
            .iter()
            .any(|pattern| lowered.contains(&pattern.to_lowercase()))
    }
}

#[async_trait]
impl<E: Exchange + 'static> Connector for SelectorConnector<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, id: &str) -> Result<Record, ConnectorError> {
        self.detail.read(id).await.map_err(|e| match e {
            ConnectorError::Transport(TransportError::Status { status: 404, .. }) => {
                ConnectorError::NotFound(id.to_string())
            }
            other => other,
        })
    }

    /// Reads one listing page and every item it links to
    ///
    /// `limit` only reaches the source through a `{limit}` placeholder in the
    /// listing URL; the page is never truncated locally.
    async fn read_bulk(&self, limit: u32, page: u32) -> Result<Page, ConnectorError> {
        let listing_url = self.listing_url_for(page, limit);
        let base = Url::parse(&listing_url)
            .map_err(|e| ConnectorError::InvalidUrl(format!("{}: {}", listing_url, e)))?;

        let response = self
            .detail
            .transport
            .get_with_headers(&listing_url, &self.detail.headers)
            .await?;

        let listing = self.parse_listing(&response.body, &base);
        tracing::debug!(
            "{} page {}: {} item links",
            self.name,
            page,
            listing.links.len()
        );

        let detail = self.detail.clone();
        let result = self
            .fanout
            .run(listing.links, |url| {
                let detail = detail.clone();
                async move { detail.read(&url).await }
            })
            .await?;

        Ok(Page {
            records: result.values,
            next_page: if listing.has_next { page + 1 } else { 0 },
            failures: result.failures,
        })
    }
}

impl<E: Exchange> DetailReader<E> {
    async fn read(&self, url: &str) -> Result<Record, ConnectorError> {
        let response = self.transport.get_with_headers(url, &self.headers).await?;
        Ok(extract_record(&response.body, url, &self.fields))
    }
}

/// Builds a record from an item page, recording a warning for every field
/// that could not be read
fn extract_record(body: &str, url: &str, fields: &[(&'static str, SelectorPath)]) -> Record {
    let document = Html::parse_document(body);
    let root = document.root_element();

    let mut record = Record {
        url: url.to_string(),
        ..Default::default()
    };

    for (field, path) in fields {
        match first(root, path).map(text_of) {
            Some(text) if !text.is_empty() => assign_field(&mut record, field, &text),
            Some(_) => record.warn(*field, "element is empty"),
            None => record.warn(*field, "no element matched"),
        }
    }

    record
}

/// Stores extracted text into the matching record field
fn assign_field(record: &mut Record, field: &str, text: &str) {
    match field {
        "name" => record.name = text.to_string(),
        "brand" => record.brand = text.to_string(),
        "series" => record.series = text.to_string(),
        "format" => record.format = text.to_string(),
        "maker" => record.maker = Some(text.to_string()),
        "manufacture-origin" => record.manufacture_origin = text.to_string(),
        "strength" => record.strength = Some(text.to_string()),
        "wrapper-origin" => record.wrapper_origin = split_list(text),
        "filler-origin" => record.filler_origin = split_list(text),
        "binder-origin" => record.binder_origin = split_list(text),
        "description" => {
            record
                .details
                .insert("description".to_string(), text.to_string());
        }
        "price" => match read_number(text) {
            Some(price) => record.price = price,
            None => record.warn(field, format!("'{}' is not a number", text)),
        },
        "length" => match read_number(text) {
            Some(value) => assign_length(record, text, value),
            None => record.warn(field, format!("'{}' is not a number", text)),
        },
        "ring" => match read_number(text) {
            Some(value) => assign_ring(record, text, value),
            None => record.warn(field, format!("'{}' is not a number", text)),
        },
        _ => record.warn(field, "unsupported field"),
    }
}

/// Length in inches, centimetres or millimetres (the default)
fn assign_length(record: &mut Record, text: &str, value: f64) {
    let unit = text.trim_end().to_lowercase();
    if unit.ends_with("inches") || unit.ends_with("inch") || unit.ends_with('"') {
        record.length_inch = value;
    } else if unit.ends_with("cm") {
        record.length_mm = (value * 100.0).round() / 10.0;
    } else {
        record.length_mm = value;
    }
}

/// Ring gauge, or a diameter when given in cm or mm
fn assign_ring(record: &mut Record, text: &str, value: f64) {
    let unit = text.trim_end().to_lowercase();
    if unit.ends_with("cm") {
        record.diameter_mm = (value * 100.0).round() / 10.0;
    } else if unit.ends_with("mm") {
        record.diameter_mm = value;
    } else {
        record.ring = value;
    }
}

/// Parses the leading number of a value such as `"12,50 EUR"`,
/// `"1.234,56 EUR"` or `"5.5 inches"`
///
/// When both separators appear the last one is the decimal mark. A separator
/// repeated on its own groups thousands; a single comma is a decimal comma.
fn read_number(text: &str) -> Option<f64> {
    let token = text.split_whitespace().next()?;
    let digits: String = token
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();

    let normalized = match (digits.rfind(','), digits.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => digits.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => digits.replace(',', ""),
        (Some(_), None) if digits.matches(',').count() > 1 => digits.replace(',', ""),
        (Some(_), None) => digits.replace(',', "."),
        (None, Some(_)) if digits.matches('.').count() > 1 => digits.replace('.', ""),
        _ => digits,
    };
    normalized.parse().ok()
}

/// Splits a comma separated list, dropping empty entries
fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
