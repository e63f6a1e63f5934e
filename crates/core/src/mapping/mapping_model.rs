//! Mapping domain models.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::mapping_constants::{DEFAULT_MIN_AUTO, DEFAULT_MIN_CANDIDATE, METADATA_WARNINGS};
use crate::bom::BomLine;

/// Closed vocabulary of life-cycle stages an inventory entry can be booked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifeCycleStage {
    #[default]
    RawMaterials,
    UpstreamTransport,
    OwnOperations,
    PurchasedEnergy,
    UsePhase,
    EndOfLife,
}

impl LifeCycleStage {
    pub const ALL: [LifeCycleStage; 6] = [
        LifeCycleStage::RawMaterials,
        LifeCycleStage::UpstreamTransport,
        LifeCycleStage::OwnOperations,
        LifeCycleStage::PurchasedEnergy,
        LifeCycleStage::UsePhase,
        LifeCycleStage::EndOfLife,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifeCycleStage::RawMaterials => "raw_materials",
            LifeCycleStage::UpstreamTransport => "upstream_transport",
            LifeCycleStage::OwnOperations => "own_operations",
            LifeCycleStage::PurchasedEnergy => "purchased_energy",
            LifeCycleStage::UsePhase => "use_phase",
            LifeCycleStage::EndOfLife => "end_of_life",
        }
    }

    /// Parses a stage label, lower-casing it and mapping `-` to `_`.
    pub fn parse(label: &str) -> Option<Self> {
        let key = label.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|stage| stage.as_str() == key)
    }

    /// Like [`LifeCycleStage::parse`] but falls back to `raw_materials`.
    pub fn normalize(label: Option<&str>) -> Self {
        label.and_then(Self::parse).unwrap_or_default()
    }
}

impl fmt::Display for LifeCycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer to a locally cached copy of an external dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub database: String,
    pub code: String,
    pub source: String,
    pub cache_path: String,
}

/// A process dataset proposed for a BOM line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCandidate {
    pub provider: String,
    pub dataset_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub mapping_rule_id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub life_cycle_stage: Option<LifeCycleStage>,
    #[serde(default)]
    pub external_reference: Option<DatasetReference>,
}

impl ProcessCandidate {
    pub fn new(
        provider: impl Into<String>,
        dataset_id: impl Into<String>,
        name: impl Into<String>,
        confidence_score: f64,
        mapping_rule_id: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            dataset_id: dataset_id.into(),
            name: name.into(),
            description: String::new(),
            confidence_score,
            mapping_rule_id: mapping_rule_id.into(),
            metadata: Map::new(),
            life_cycle_stage: None,
            external_reference: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Text the fuzzy matcher compares a query against.
    pub fn match_text(&self) -> String {
        format!("{} {}", self.name, self.description).trim().to_string()
    }

    /// Appends a message to `metadata.warnings`, creating the list if needed.
    pub fn push_warning(&mut self, message: impl Into<String>) {
        let entry = self
            .metadata
            .entry(METADATA_WARNINGS.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(vec![entry.take()]);
        }
        if let Value::Array(items) = entry {
            items.push(Value::String(message.into()));
        }
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.metadata
            .get(METADATA_WARNINGS)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Deterministic mapping rule. Lower priority values are evaluated first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    pub id: String,
    pub name: String,
    pub rule_code: String,
    pub priority: i32,
    pub material_code: Option<String>,
    pub material_family: Option<String>,
    pub classification_prefix: Option<String>,
    pub supplier_id: Option<String>,
    pub provider: String,
    pub dataset_id: String,
    pub description: Option<String>,
}

impl MappingRule {
    /// Family equals and the classification code starts with the rule's
    /// prefix. Rules without a prefix never match.
    pub fn matches_family_prefix(&self, material_family: &str, classification_code: &str) -> bool {
        match (&self.material_family, &self.classification_prefix) {
            (Some(family), Some(prefix)) => {
                family == material_family && classification_code.starts_with(prefix.as_str())
            }
            _ => false,
        }
    }

    /// Supplier equals and neither the rule's material code nor family
    /// disagrees with the line.
    pub fn admits_supplier_line(
        &self,
        supplier_id: &str,
        material_family: Option<&str>,
        material_code: Option<&str>,
    ) -> bool {
        if self.supplier_id.as_deref() != Some(supplier_id) {
            return false;
        }
        if let Some(code) = self.material_code.as_deref() {
            if Some(code) != material_code {
                return false;
            }
        }
        if let Some(family) = self.material_family.as_deref() {
            if Some(family) != material_family {
                return false;
            }
        }
        true
    }
}

/// Outcome of resolving one BOM line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MappingDecision {
    pub bom_item_id: String,
    pub selected: Option<ProcessCandidate>,
    pub alternatives: Vec<ProcessCandidate>,
    pub candidates: Vec<ProcessCandidate>,
    pub reasoning: String,
    pub rule_applied: Option<String>,
    pub auto_selected: bool,
    pub override_applied: bool,
    pub confidence_score: Option<f64>,
    pub life_cycle_stage: LifeCycleStage,
}

/// JSON payload stored alongside the flattened decision columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPayload {
    #[serde(default)]
    pub alternatives: Vec<ProcessCandidate>,
    #[serde(default)]
    pub candidates: Vec<ProcessCandidate>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub life_cycle_stage: Option<LifeCycleStage>,
    #[serde(default)]
    pub overridden_by: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A persisted row of the decision log.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub id: i64,
    pub product_id: String,
    pub bom_item_id: String,
    pub scenario_id: Option<String>,
    pub selected_dataset_id: Option<String>,
    pub selected_provider: Option<String>,
    pub confidence_score: Option<f64>,
    pub rule_applied: Option<String>,
    pub user_id: Option<String>,
    pub comment: Option<String>,
    pub auto_selected: bool,
    pub is_override: bool,
    pub payload: DecisionPayload,
    pub created_at: NaiveDateTime,
}

impl DecisionRecord {
    /// Newer-first ordering key. The id breaks ties between rows written in
    /// the same clock tick.
    pub fn recency_key(&self) -> (NaiveDateTime, i64) {
        (self.created_at, self.id)
    }

    pub fn summary(&self) -> DecisionSummary {
        DecisionSummary {
            id: self.id,
            product_id: self.product_id.clone(),
            bom_item_id: self.bom_item_id.clone(),
            scenario_id: self.scenario_id.clone(),
            selected_dataset_id: self.selected_dataset_id.clone(),
            selected_provider: self.selected_provider.clone(),
            confidence_score: self.confidence_score,
            rule_applied: self.rule_applied.clone(),
            user_id: self.user_id.clone(),
            comment: self.comment.clone(),
            auto_selected: self.auto_selected,
            is_override: self.is_override,
            created_at: self.created_at,
            life_cycle_stage: self.payload.life_cycle_stage,
        }
    }
}

/// History view of a decision record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSummary {
    pub id: i64,
    pub product_id: String,
    pub bom_item_id: String,
    pub scenario_id: Option<String>,
    pub selected_dataset_id: Option<String>,
    pub selected_provider: Option<String>,
    pub confidence_score: Option<f64>,
    pub rule_applied: Option<String>,
    pub user_id: Option<String>,
    pub comment: Option<String>,
    pub auto_selected: bool,
    pub is_override: bool,
    pub created_at: NaiveDateTime,
    pub life_cycle_stage: Option<LifeCycleStage>,
}

/// A decision record about to be appended to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDecisionRecord {
    pub product_id: String,
    pub bom_item_id: String,
    pub scenario_id: Option<String>,
    pub selected_dataset_id: Option<String>,
    pub selected_provider: Option<String>,
    pub confidence_score: Option<f64>,
    pub rule_applied: Option<String>,
    pub user_id: Option<String>,
    pub comment: Option<String>,
    pub auto_selected: bool,
    pub is_override: bool,
    pub payload: DecisionPayload,
}

impl NewDecisionRecord {
    /// Record for a decision produced by the resolution pipeline.
    pub fn automatic(line: &BomLine, scenario_id: Option<&str>, decision: &MappingDecision) -> Self {
        let payload = DecisionPayload {
            alternatives: decision.alternatives.clone(),
            candidates: decision.candidates.clone(),
            reasoning: Some(decision.reasoning.clone()),
            life_cycle_stage: Some(decision.life_cycle_stage),
            overridden_by: None,
            comment: None,
        };
        Self::from_decision(line, scenario_id, decision, None, None, payload)
    }

    /// Record for a manual override.
    pub fn manual_override(
        line: &BomLine,
        scenario_id: Option<&str>,
        decision: &MappingDecision,
        user_id: Option<&str>,
        comment: Option<&str>,
    ) -> Self {
        let payload = DecisionPayload {
            alternatives: Vec::new(),
            candidates: decision.candidates.clone(),
            reasoning: Some(decision.reasoning.clone()),
            life_cycle_stage: Some(decision.life_cycle_stage),
            overridden_by: user_id.map(str::to_string),
            comment: comment.map(str::to_string),
        };
        Self::from_decision(line, scenario_id, decision, user_id, comment, payload)
    }

    fn from_decision(
        line: &BomLine,
        scenario_id: Option<&str>,
        decision: &MappingDecision,
        user_id: Option<&str>,
        comment: Option<&str>,
        payload: DecisionPayload,
    ) -> Self {
        Self {
            product_id: line.product_id.clone(),
            bom_item_id: decision.bom_item_id.clone(),
            scenario_id: scenario_id.map(str::to_string),
            selected_dataset_id: decision.selected.as_ref().map(|c| c.dataset_id.clone()),
            selected_provider: decision.selected.as_ref().map(|c| c.provider.clone()),
            confidence_score: decision.confidence_score,
            rule_applied: decision.rule_applied.clone(),
            user_id: user_id.map(str::to_string),
            comment: comment.map(str::to_string),
            auto_selected: decision.auto_selected,
            is_override: decision.override_applied,
            payload,
        }
    }
}

/// Manual override request for one BOM line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequest {
    pub dataset_id: String,
    pub provider: String,
    pub user_id: Option<String>,
    pub comment: Option<String>,
    pub scenario_id: Option<String>,
    pub life_cycle_stage: Option<String>,
}

/// One resolved inventory entry for an emissions calculator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LciEntry {
    pub bom_item_id: String,
    pub dataset_id: String,
    pub provider: String,
    pub quantity: f64,
    pub unit: String,
    pub mass_kg: f64,
    pub life_cycle_stage: LifeCycleStage,
    pub external_reference: Option<DatasetReference>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LciModel {
    pub product_id: String,
    pub lines: Vec<BomLine>,
    pub entries: Vec<LciEntry>,
}

/// Fuzzy-matching thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MappingSettings {
    /// Candidates scoring below this are dropped.
    pub min_candidate: f64,
    /// The best candidate is auto-selected at or above this.
    pub min_auto: f64,
}

impl MappingSettings {
    pub fn new(min_candidate: f64, min_auto: f64) -> Result<Self, MappingError> {
        let settings = Self {
            min_candidate,
            min_auto,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), MappingError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.min_candidate) || !in_unit(self.min_auto) {
            return Err(MappingError::InvalidSettings(format!(
                "thresholds must lie in [0, 1] (candidate {}, auto {})",
                self.min_candidate, self.min_auto
            )));
        }
        if self.min_candidate > self.min_auto {
            return Err(MappingError::InvalidSettings(format!(
                "candidate floor {} exceeds auto-accept threshold {}",
                self.min_candidate, self.min_auto
            )));
        }
        Ok(())
    }
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            min_candidate: DEFAULT_MIN_CANDIDATE,
            min_auto: DEFAULT_MIN_AUTO,
        }
    }
}

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("No confirmed mapping for BOM item {bom_item_id}. Review mappings before building the inventory model.")]
    UnconfirmedMapping { bom_item_id: String },

    #[error("Invalid mapping settings: {0}")]
    InvalidSettings(String),

    #[error("Corrupt decision payload in record {record_id}: {message}")]
    Payload { record_id: i64, message: String },
}
