//! Mapping module - resolution of BOM lines to LCI process datasets.

pub mod mapping_constants;
mod mapping_model;
mod mapping_resolution;
mod mapping_service;
mod mapping_traits;
mod similarity;

pub use mapping_model::{
    DatasetReference, DecisionPayload, DecisionRecord, DecisionSummary, LciEntry, LciModel,
    LifeCycleStage, MappingDecision, MappingError, MappingRule, MappingSettings,
    NewDecisionRecord, OverrideRequest, ProcessCandidate,
};
pub use mapping_resolution::{
    candidate_from_rule, decision_from_record, parse_catalog_identifier,
    select_effective_records,
};
pub use mapping_service::MappingService;
pub use mapping_traits::{
    CandidateProvider, DatasetCacheTrait, MappingDecisionRepositoryTrait,
    MappingRuleRepositoryTrait, MappingServiceTrait, ProcessCatalog,
};
pub use similarity::{build_query, token_set_ratio};
