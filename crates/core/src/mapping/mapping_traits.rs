use async_trait::async_trait;

use super::mapping_model::{
    DatasetReference, DecisionRecord, DecisionSummary, LciModel, MappingDecision, MappingRule,
    NewDecisionRecord, OverrideRequest, ProcessCandidate,
};
use crate::bom::BomLine;
use crate::errors::Result;
use crate::products::Product;
use crate::scenarios::Scenario;

/// A source of process-dataset candidates for BOM lines.
///
/// Providers are queried in registration order during the fuzzy tier. An
/// error from one provider is logged and treated as "no candidates".
#[async_trait]
pub trait CandidateProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn find_candidates(&self, line: &BomLine) -> Result<Vec<ProcessCandidate>>;
}

/// A remote catalog that can look up a single process by uuid.
#[async_trait]
pub trait ProcessCatalog: Send + Sync {
    /// `Ok(None)` when the catalog has no such process or the document could
    /// not be interpreted.
    async fn get_process(
        &self,
        uuid: &str,
        version: Option<&str>,
    ) -> Result<Option<ProcessCandidate>>;
}

/// Fetches datasets into a local cache and reports where they live.
#[async_trait]
pub trait DatasetCacheTrait: Send + Sync {
    async fn build_reference(&self, provider: &str, dataset_id: &str) -> Result<DatasetReference>;
}

/// Read access to the deterministic rule set. Every lookup returns the
/// first match by ascending priority.
pub trait MappingRuleRepositoryTrait: Send + Sync {
    fn rule_by_material_code(&self, material_code: &str) -> Result<Option<MappingRule>>;
    fn rule_by_family_prefix(
        &self,
        material_family: &str,
        classification_code: &str,
    ) -> Result<Option<MappingRule>>;
    fn rule_by_supplier(
        &self,
        supplier_id: &str,
        material_family: Option<&str>,
        material_code: Option<&str>,
    ) -> Result<Option<MappingRule>>;
    fn list_rules(&self) -> Result<Vec<MappingRule>>;
}

/// Append-only decision log.
#[async_trait]
pub trait MappingDecisionRepositoryTrait: Send + Sync {
    fn get_latest_decision(&self, bom_item_id: &str) -> Result<Option<DecisionRecord>>;
    fn get_latest_override(&self, bom_item_id: &str) -> Result<Option<DecisionRecord>>;
    /// One effective record per BOM line of the product (latest override,
    /// else latest decision).
    fn latest_decisions_for_product(&self, product_id: &str) -> Result<Vec<DecisionRecord>>;
    /// All records of the product, newest first.
    fn list_history_for_product(&self, product_id: &str) -> Result<Vec<DecisionRecord>>;
    async fn record_decision(&self, record: NewDecisionRecord) -> Result<DecisionRecord>;
}

#[async_trait]
pub trait MappingServiceTrait: Send + Sync {
    /// Resolves every line, one decision per line in input order.
    async fn resolve(
        &self,
        lines: &[BomLine],
        scenario: Option<&Scenario>,
    ) -> Result<Vec<MappingDecision>>;
    async fn record_override(
        &self,
        line: &BomLine,
        request: OverrideRequest,
    ) -> Result<MappingDecision>;
    fn load_latest_decisions(&self, product_id: &str) -> Result<Vec<MappingDecision>>;
    fn list_history(&self, product_id: &str) -> Result<Vec<DecisionSummary>>;
    async fn build_lci_model(
        &self,
        product: &Product,
        lines: &[BomLine],
        scenario: Option<&Scenario>,
    ) -> Result<(LciModel, Vec<MappingDecision>)>;
}
