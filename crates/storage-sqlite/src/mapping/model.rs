//! Database models for mapping rules and decisions.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use ecomap_core::errors::Result;
use ecomap_core::mapping::{
    DecisionPayload, DecisionRecord, MappingError, MappingRule, NewDecisionRecord,
};

/// Database model for mapping rules
#[derive(Queryable, Identifiable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::mapping_rules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MappingRuleDB {
    pub id: i32,
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
    pub created_at: NaiveDateTime,
}

/// Seed entry, deserialized from the embedded rule file and inserted as is.
#[derive(Insertable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::mapping_rules)]
pub struct NewMappingRuleDB {
    pub name: String,
    pub rule_code: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub material_code: Option<String>,
    #[serde(default)]
    pub material_family: Option<String>,
    #[serde(default)]
    pub classification_prefix: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    pub provider: String,
    pub dataset_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<MappingRuleDB> for MappingRule {
    fn from(db: MappingRuleDB) -> Self {
        Self {
            id: db.id.to_string(),
            name: db.name,
            rule_code: db.rule_code,
            priority: db.priority,
            material_code: db.material_code,
            material_family: db.material_family,
            classification_prefix: db.classification_prefix,
            supplier_id: db.supplier_id,
            provider: db.provider,
            dataset_id: db.dataset_id,
            description: db.description,
        }
    }
}

/// Database model for the decision log
#[derive(Queryable, QueryableByName, Identifiable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::mapping_decisions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MappingDecisionDB {
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
    pub decision_payload: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::mapping_decisions)]
pub struct NewMappingDecisionDB {
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
    pub decision_payload: String,
    pub created_at: NaiveDateTime,
}

impl NewMappingDecisionDB {
    pub fn from_domain(record: NewDecisionRecord, created_at: NaiveDateTime) -> Result<Self> {
        let decision_payload = serde_json::to_string(&record.payload)?;
        Ok(Self {
            product_id: record.product_id,
            bom_item_id: record.bom_item_id,
            scenario_id: record.scenario_id,
            selected_dataset_id: record.selected_dataset_id,
            selected_provider: record.selected_provider,
            confidence_score: record.confidence_score,
            rule_applied: record.rule_applied,
            user_id: record.user_id,
            comment: record.comment,
            auto_selected: record.auto_selected,
            is_override: record.is_override,
            decision_payload,
            created_at,
        })
    }
}

impl MappingDecisionDB {
    /// Converts the row to a domain record. A payload that is not valid JSON
    /// is reported against the row id.
    pub fn into_record(self) -> Result<DecisionRecord> {
        let payload: DecisionPayload = if self.decision_payload.trim().is_empty() {
            DecisionPayload::default()
        } else {
            serde_json::from_str(&self.decision_payload).map_err(|e| MappingError::Payload {
                record_id: self.id,
                message: e.to_string(),
            })?
        };
        Ok(DecisionRecord {
            id: self.id,
            product_id: self.product_id,
            bom_item_id: self.bom_item_id,
            scenario_id: self.scenario_id,
            selected_dataset_id: self.selected_dataset_id,
            selected_provider: self.selected_provider,
            confidence_score: self.confidence_score,
            rule_applied: self.rule_applied,
            user_id: self.user_id,
            comment: self.comment,
            auto_selected: self.auto_selected,
            is_override: self.is_override,
            payload,
            created_at: self.created_at,
        })
    }
}
