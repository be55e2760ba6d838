use crate::config::validation::build_header_map;
use crate::record::IdentityKey;
use crate::ConfigResult;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration structure for a harvest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub connector: ConnectorConfig,
}

/// Page loop and fan-out configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// First page requested
    #[serde(rename = "page-min")]
    pub page_min: u32,

    /// Last page requested, 0 for no ceiling
    #[serde(rename = "page-max")]
    pub page_max: u32,

    /// Items requested per page
    pub limit: u32,

    /// Maximum number of concurrent item fetches
    pub concurrency: usize,

    /// Pause between two pages (milliseconds)
    #[serde(rename = "page-delay-ms")]
    pub page_delay_ms: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            page_min: 1,
            page_max: 0,
            limit: 100,
            concurrency: 8,
            page_delay_ms: 1000,
        }
    }
}

/// HTTP and rate-limit backoff configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Delay before the first retry after a 429 (milliseconds)
    #[serde(rename = "initial-delay-ms")]
    pub initial_delay_ms: u64,

    /// Extra delay per consecutive 429 (milliseconds)
    #[serde(rename = "backoff-ms")]
    pub backoff_ms: u64,

    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 6000,
            backoff_ms: 5000,
            max_attempts: 5,
            timeout_secs: 30,
            user_agent: format!("humidor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON document per record
    pub path: String,

    /// Record field hashed into the document name
    #[serde(rename = "identity-key")]
    pub identity_key: IdentityKey,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "/tmp/humidor".to_string(),
            identity_key: IdentityKey::Url,
        }
    }
}

/// Source description for the selector-driven connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Source name used in logs
    pub name: String,

    /// Listing page template, `{page}` is replaced by the page number
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Selector path of the links to item pages
    #[serde(rename = "item-link")]
    pub item_link: String,

    /// Marker present on a listing page when a further page exists
    #[serde(rename = "next-page", default)]
    pub next_page: Option<String>,

    /// Item links containing any of these fragments are ignored
    #[serde(rename = "skip-patterns", default)]
    pub skip_patterns: Vec<String>,

    /// Extra request headers, e.g. a session cookie
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub fields: FieldSelectors,
}

/// Selector paths of the record fields on an item page
///
/// Unset fields are not extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FieldSelectors {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub series: Option<String>,
    pub format: Option<String>,
    pub maker: Option<String>,
    pub manufacture_origin: Option<String>,
    pub strength: Option<String>,
    pub price: Option<String>,
    pub length: Option<String>,
    pub ring: Option<String>,
    pub wrapper_origin: Option<String>,
    pub filler_origin: Option<String>,
    pub binder_origin: Option<String>,
    pub description: Option<String>,
}

impl ConnectorConfig {
    /// Builds the request headers sent with every call to the source
    pub fn header_map(&self) -> ConfigResult<HeaderMap> {
        build_header_map(&self.headers)
    }
}

impl FieldSelectors {
    /// Returns every configured `(field, selector path)` pair
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("name", &self.name),
            ("brand", &self.brand),
            ("series", &self.series),
            ("format", &self.format),
            ("maker", &self.maker),
            ("manufacture-origin", &self.manufacture_origin),
            ("strength", &self.strength),
            ("price", &self.price),
            ("length", &self.length),
            ("ring", &self.ring),
            ("wrapper-origin", &self.wrapper_origin),
            ("filler-origin", &self.filler_origin),
            ("binder-origin", &self.binder_origin),
            ("description", &self.description),
        ]
        .into_iter()
        .filter_map(|(field, path)| path.as_deref().map(|path| (field, path)))
    }
}
