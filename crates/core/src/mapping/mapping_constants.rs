/// Confidence assigned to candidates produced by a deterministic rule.
pub const RULE_CONFIDENCE: f64 = 0.95;

/// Confidence of a BOM-supplied dataset id resolved through the remote catalog.
pub const DIRECT_CATALOG_CONFIDENCE: f64 = 0.99;

/// Confidence of a BOM-supplied dataset id that could not be resolved remotely.
pub const DIRECT_MANUAL_CONFIDENCE: f64 = 0.9;

pub const OVERRIDE_CONFIDENCE: f64 = 1.0;

/// Maximum number of alternatives kept for a review-only fuzzy decision.
pub const MAX_REVIEW_CANDIDATES: usize = 5;

pub const DEFAULT_MIN_CANDIDATE: f64 = 0.6;
pub const DEFAULT_MIN_AUTO: f64 = 0.85;

pub const RULE_OVERRIDE: &str = "override";
pub const RULE_DIRECT_DATASET: &str = "direct_lci_dataset";
pub const RULE_CATALOG_DIRECT: &str = "soda4lca_direct";
pub const RULE_FUZZY_AUTO: &str = "fuzzy_auto";
pub const RULE_FUZZY_REVIEW: &str = "fuzzy_review";
pub const RULE_HISTORICAL: &str = "historical";

pub const MANUAL_PROVIDER: &str = "manual";

pub const DEFAULT_LCI_UNIT: &str = "ea";

/// Metadata key under which enrichment failures are collected.
pub const METADATA_WARNINGS: &str = "warnings";
