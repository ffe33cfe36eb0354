use clap::ValueEnum;
use serde::Serialize;

/// Lowest marketplace price. The api returns either a bare number or a
/// value/currency pair depending on the release. Serialized back in the
/// same two shapes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LowestPrice {
    Amount(f64),
    Priced { value: f64, currency: String }
}

impl LowestPrice {
    /// Scalar used for comparisons and display
    pub fn amount(&self) -> f64 {
        match self {
            LowestPrice::Amount(v) => *v,
            LowestPrice::Priced { value, .. } => *value
        }
    }
}

/// One normalized catalog entry, rebuilt wholesale on every refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseSummary {
    pub id: u64,
    pub title: String,
    pub artists: String,
    pub num_for_sale: Option<u64>,
    pub lowest_price: Option<LowestPrice>,
    pub resource_url: String,
    pub uri: Option<String>,
    pub thumb_url: Option<String>,
    pub image_url: Option<String>
}

impl ReleaseSummary {
    /// Canonical page if known, otherwise the api resource
    pub fn link(&self) -> &str {
        self.uri.as_deref().unwrap_or(&self.resource_url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortKey {
    #[default]
    Lowest,
    ForSale,
    Artist,
    Id
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection
}

/// How `show`/`watch` print the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewFilter {
    pub only_in_stock: bool
}
