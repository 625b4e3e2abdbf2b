//! Static registry of cached artifact kinds and their key patterns.
//!
//! Years of accumulated key-format drift are isolated here: every spelling a
//! cached artifact has ever been stored under lives in this one table, as
//! parallel patterns under a single [`ArtifactKind`]. Adding a new cached
//! artifact (or a new spelling of an old one) means adding one registry
//! entry; no invalidator code changes.
//!
//! ## Key formats
//!
//! | Kind | Keys |
//! |------|------|
//! | `MarketSnapshot`    | `market:snapshot:{id}` |
//! | `LegacyPricing`     | `pricing:{id}` |
//! | `SimplifiedPricing` | `pricing:simple:{id}` |
//! | `Sparkline`         | `market:sparkline:{id}` |
//! | `SalesComparables`  | `sales:{id}`, `sales:comps:{id}`, `market:sales:{id}`, `comps/{id}` |
//! | `AssetRecord`       | `asset:{id}` |
//! | `PricingBatch`      | everything under `batch:` |
//! | `CollectionListing` | everything under `collection:list:` |

/// A kind of cached derived value.
///
/// `SalesComparables` carries four historical key spellings that must always
/// be invalidated together. `PricingBatch` and `CollectionListing` are
/// aggregate artifacts: they are not keyed by a single identity and are
/// swept by namespace instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    MarketSnapshot,
    LegacyPricing,
    SimplifiedPricing,
    Sparkline,
    SalesComparables,
    AssetRecord,
    PricingBatch,
    CollectionListing,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarketSnapshot => "market_snapshot",
            Self::LegacyPricing => "legacy_pricing",
            Self::SimplifiedPricing => "simplified_pricing",
            Self::Sparkline => "sparkline",
            Self::SalesComparables => "sales_comparables",
            Self::AssetRecord => "asset_record",
            Self::PricingBatch => "pricing_batch",
            Self::CollectionListing => "collection_listing",
        }
    }

    /// Aggregate artifacts cannot be narrowed to one identity and are
    /// invalidated once per sweep via their namespace prefix.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::PricingBatch | Self::CollectionListing)
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule for deriving concrete cache keys for an artifact kind.
#[derive(Debug, Clone, Copy)]
pub enum KeyPattern {
    /// Pure function of the alias, for per-identity artifacts.
    Template {
        prefix: &'static str,
        render: fn(&str) -> String,
    },
    /// Namespace prefix match on the cache entry key, for aggregate
    /// artifacts. Never depends on the alias being invalidated.
    Namespace { prefix: &'static str },
}

impl KeyPattern {
    /// The namespace prefix this pattern's keys live under. Used for
    /// whole-namespace sweeps.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Template { prefix, .. } | Self::Namespace { prefix } => prefix,
        }
    }

    /// Whether a concrete cache entry key belongs to this pattern's
    /// namespace.
    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(self.prefix())
    }
}

fn market_snapshot_key(alias: &str) -> String {
    format!("market:snapshot:{alias}")
}

fn legacy_pricing_key(alias: &str) -> String {
    format!("pricing:{alias}")
}

fn simplified_pricing_key(alias: &str) -> String {
    format!("pricing:simple:{alias}")
}

fn sparkline_key(alias: &str) -> String {
    format!("market:sparkline:{alias}")
}

fn sales_key(alias: &str) -> String {
    format!("sales:{alias}")
}

fn sales_comps_key(alias: &str) -> String {
    format!("sales:comps:{alias}")
}

fn market_sales_key(alias: &str) -> String {
    format!("market:sales:{alias}")
}

// Oldest comparables spelling, slash-separated.
fn comps_path_key(alias: &str) -> String {
    format!("comps/{alias}")
}

fn asset_record_key(alias: &str) -> String {
    format!("asset:{alias}")
}

static MARKET_SNAPSHOT: [KeyPattern; 1] = [KeyPattern::Template {
    prefix: "market:snapshot:",
    render: market_snapshot_key,
}];

static LEGACY_PRICING: [KeyPattern; 1] = [KeyPattern::Template {
    prefix: "pricing:",
    render: legacy_pricing_key,
}];

static SIMPLIFIED_PRICING: [KeyPattern; 1] = [KeyPattern::Template {
    prefix: "pricing:simple:",
    render: simplified_pricing_key,
}];

static SPARKLINE: [KeyPattern; 1] = [KeyPattern::Template {
    prefix: "market:sparkline:",
    render: sparkline_key,
}];

static SALES_COMPARABLES: [KeyPattern; 4] = [
    KeyPattern::Template {
        prefix: "sales:",
        render: sales_key,
    },
    KeyPattern::Template {
        prefix: "sales:comps:",
        render: sales_comps_key,
    },
    KeyPattern::Template {
        prefix: "market:sales:",
        render: market_sales_key,
    },
    KeyPattern::Template {
        prefix: "comps/",
        render: comps_path_key,
    },
];

static ASSET_RECORD: [KeyPattern; 1] = [KeyPattern::Template {
    prefix: "asset:",
    render: asset_record_key,
}];

// Matches every batch query namespace, not just pricing batches; unrelated
// batch queries share the prefix and get swept along. Over-invalidation is
// safe, narrowing this could under-invalidate.
static PRICING_BATCH: [KeyPattern; 1] = [KeyPattern::Namespace { prefix: "batch:" }];

static COLLECTION_LISTING: [KeyPattern; 1] = [KeyPattern::Namespace {
    prefix: "collection:list:",
}];

static ALL_KINDS: [ArtifactKind; 8] = [
    ArtifactKind::MarketSnapshot,
    ArtifactKind::LegacyPricing,
    ArtifactKind::SimplifiedPricing,
    ArtifactKind::Sparkline,
    ArtifactKind::SalesComparables,
    ArtifactKind::AssetRecord,
    ArtifactKind::PricingBatch,
    ArtifactKind::CollectionListing,
];

/// Key patterns registered for an artifact kind. Every kind has at least
/// one.
pub fn patterns_for(kind: ArtifactKind) -> &'static [KeyPattern] {
    match kind {
        ArtifactKind::MarketSnapshot => &MARKET_SNAPSHOT,
        ArtifactKind::LegacyPricing => &LEGACY_PRICING,
        ArtifactKind::SimplifiedPricing => &SIMPLIFIED_PRICING,
        ArtifactKind::Sparkline => &SPARKLINE,
        ArtifactKind::SalesComparables => &SALES_COMPARABLES,
        ArtifactKind::AssetRecord => &ASSET_RECORD,
        ArtifactKind::PricingBatch => &PRICING_BATCH,
        ArtifactKind::CollectionListing => &COLLECTION_LISTING,
    }
}

/// Every registered artifact kind, aggregates included.
pub fn all_artifact_kinds() -> &'static [ArtifactKind] {
    &ALL_KINDS
}
