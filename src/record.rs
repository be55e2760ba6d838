//! Harvested product records
//!
//! A [`Record`] is a flat, denormalized description of one cigar as seen by
//! one source. Records hold no references to each other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One harvested product
///
/// Maps are ordered so that serializing an unchanged record always produces
/// the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Record {
    // ===== Identification =====
    pub name: String,

    /// Link to the page the record was harvested from
    pub url: String,

    pub brand: String,

    pub series: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub video_urls: Vec<String>,

    /// Free text details, e.g. a description of the cigar
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,

    // ===== Shape =====
    #[serde(rename = "diameter_mm")]
    pub diameter_mm: f64,

    pub ring: f64,

    #[serde(rename = "length_mm")]
    pub length_mm: f64,

    #[serde(rename = "length_inch")]
    pub length_inch: f64,

    /// Vitola, e.g. robusto
    pub format: String,

    // ===== Manufacturing =====
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maker: Option<String>,

    pub manufacture_origin: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_of_manufacturing: Option<String>,

    /// e.g. long filler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construction: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_boxpressed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_discontinued: Option<bool>,

    // ===== Blend =====
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wrapper_origin: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filler_origin: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binder_origin: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapper_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_flavoured: Option<bool>,

    // ===== Taste =====
    /// Aromas according to the source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aroma_profile_manufacturer: Vec<String>,

    /// Aromas voted by the source's community
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aroma_profile_community: Option<AromaProfileCommunity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavour_strength: Option<String>,

    /// Reference smoking duration as published, e.g. "45 to 60 min"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoking_duration: Option<String>,

    // ===== Purchase =====
    /// Price of a single unit
    pub price: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,

    /// Field-level extraction problems; the record is still usable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FieldWarning>,
}

/// Community aroma votes, weights normalized to sum to 1
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AromaProfileCommunity {
    pub weights: BTreeMap<String, f64>,
    pub number_of_votes: u32,
}

/// A field that could not be extracted, or was malformed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWarning {
    pub field: String,
    pub message: String,
}

impl FieldWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Record {
    /// Attaches a field warning
    pub fn warn(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(FieldWarning::new(field, message));
    }

    /// Returns true if no field warnings were recorded
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// The record field hashed to address a record in storage
///
/// Source URLs are the default: display names are not unique across vendors
/// and sizes, so hashing them merges distinct products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKey {
    #[default]
    Url,
    Name,
}

impl IdentityKey {
    /// Returns the value of the identity field of `record`
    pub fn of<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            Self::Url => &record.url,
            Self::Name => &record.name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Name => "name",
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
