//! Pure building blocks of the resolution pipeline.
//!
//! Nothing here touches storage or the network; the service composes these
//! with its repositories and providers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use super::mapping_constants::*;
use super::mapping_model::{
    DecisionRecord, LifeCycleStage, MappingDecision, MappingRule, MappingSettings,
    ProcessCandidate,
};
use super::similarity::token_set_ratio;
use crate::bom::BomLine;

/// Result of a single tier before stage assignment and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct TierOutcome {
    pub selected: Option<ProcessCandidate>,
    pub alternatives: Vec<ProcessCandidate>,
    pub rule_applied: Option<String>,
    pub reasoning: String,
    pub confidence_score: Option<f64>,
}

impl TierOutcome {
    pub fn selected(candidate: ProcessCandidate, rule: &str, reasoning: String) -> Self {
        Self {
            confidence_score: Some(candidate.confidence_score),
            selected: Some(candidate),
            alternatives: Vec::new(),
            rule_applied: Some(rule.to_string()),
            reasoning,
        }
    }
}

const CATALOG_PREFIX: &str = "soda4lca:";

/// Splits a catalog identifier into `(uuid, version)`.
///
/// Accepts an optional `soda4lca:` prefix (any case) and a version given as
/// `?version=v` or `@v`. Returns `None` for an empty identifier.
pub fn parse_catalog_identifier(dataset_id: &str) -> Option<(String, Option<String>)> {
    let mut value = dataset_id.trim();
    if let Some(rest) = value
        .get(..CATALOG_PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(CATALOG_PREFIX))
        .and_then(|_| value.get(CATALOG_PREFIX.len()..))
    {
        value = rest;
    }

    let (id, version) = if let Some((id, version)) = value.split_once("?version=") {
        (id, Some(version))
    } else if let Some((id, version)) = value.split_once('@') {
        (id, Some(version))
    } else {
        (value, None)
    };

    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    let version = version
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    Some((id.to_string(), version))
}

/// Candidate produced by a matched deterministic rule.
pub fn candidate_from_rule(rule: &MappingRule) -> ProcessCandidate {
    let opt = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
    ProcessCandidate::new(
        rule.provider.clone(),
        rule.dataset_id.clone(),
        rule.name.clone(),
        RULE_CONFIDENCE,
        rule.rule_code.clone(),
    )
    .with_description(
        rule.description
            .clone()
            .unwrap_or_else(|| "Rule-derived dataset".to_string()),
    )
    .with_metadata("rule_id", rule.id.clone())
    .with_metadata("material_code", opt(&rule.material_code))
    .with_metadata("material_family", opt(&rule.material_family))
    .with_metadata("classification_prefix", opt(&rule.classification_prefix))
}

/// Synthetic candidate for a BOM-supplied dataset id the catalog could not
/// resolve.
pub fn direct_dataset_candidate(dataset_id: &str) -> ProcessCandidate {
    ProcessCandidate::new(
        MANUAL_PROVIDER,
        dataset_id,
        "BOM supplied dataset",
        DIRECT_MANUAL_CONFIDENCE,
        RULE_DIRECT_DATASET,
    )
    .with_description("BOM row referenced dataset id")
    .with_metadata("source", "bom")
}

/// Synthetic candidate for a manual override.
pub fn override_candidate(
    provider: &str,
    dataset_id: &str,
    user_id: Option<&str>,
    stage: LifeCycleStage,
) -> ProcessCandidate {
    let mut candidate = ProcessCandidate::new(
        provider,
        dataset_id,
        "Manual override",
        OVERRIDE_CONFIDENCE,
        RULE_OVERRIDE,
    )
    .with_description("User supplied override")
    .with_metadata("user", user_id.unwrap_or("unknown"));
    candidate.life_cycle_stage = Some(stage);
    candidate
}

fn by_confidence_desc(a: &ProcessCandidate, b: &ProcessCandidate) -> Ordering {
    b.confidence_score
        .partial_cmp(&a.confidence_score)
        .unwrap_or(Ordering::Equal)
}

/// Scores and ranks fuzzy candidates.
///
/// Each candidate's confidence becomes `max(heuristic, similarity)`. Those
/// under the candidate floor are dropped and the rest sorted descending
/// (stable, so provider order breaks ties).
pub fn select_fuzzy(
    query: &str,
    candidates: Vec<ProcessCandidate>,
    settings: &MappingSettings,
) -> TierOutcome {
    let mut viable: Vec<ProcessCandidate> = candidates
        .into_iter()
        .map(|mut candidate| {
            let similarity = token_set_ratio(query, &candidate.match_text());
            candidate.confidence_score = candidate.confidence_score.max(similarity);
            candidate
        })
        .filter(|c| c.confidence_score >= settings.min_candidate)
        .collect();
    viable.sort_by(by_confidence_desc);

    let best = viable.first().map(|c| c.confidence_score);
    match best {
        Some(score) if score >= settings.min_auto => {
            let mut rest = viable;
            let selected = rest.remove(0);
            TierOutcome {
                reasoning: format!("Auto-selected via fuzzy matching ({:.2})", score),
                selected: Some(selected),
                alternatives: rest,
                rule_applied: Some(RULE_FUZZY_AUTO.to_string()),
                confidence_score: Some(score),
            }
        }
        Some(score) => {
            viable.truncate(MAX_REVIEW_CANDIDATES);
            TierOutcome {
                selected: None,
                alternatives: viable,
                rule_applied: Some(RULE_FUZZY_REVIEW.to_string()),
                reasoning: "Fuzzy matching produced candidates for review".to_string(),
                confidence_score: Some(score),
            }
        }
        None => TierOutcome {
            selected: None,
            alternatives: Vec::new(),
            rule_applied: Some(RULE_FUZZY_REVIEW.to_string()),
            reasoning: "No candidates; manual mapping needed".to_string(),
            confidence_score: None,
        },
    }
}

/// Stage of a decision: the selected candidate's stage, else
/// `own_operations` for supplier lines where a rule applied, else
/// `raw_materials`.
pub fn determine_stage(
    line: &BomLine,
    selected: Option<&ProcessCandidate>,
    rule_applied: Option<&str>,
) -> LifeCycleStage {
    if let Some(stage) = selected.and_then(|c| c.life_cycle_stage) {
        return stage;
    }
    let has_supplier = line
        .supplier_id
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    if has_supplier && rule_applied.is_some() {
        return LifeCycleStage::OwnOperations;
    }
    LifeCycleStage::RawMaterials
}

/// Assembles the decision for a tier outcome. Candidates without a stage
/// inherit the decision stage.
pub fn decision_from_outcome(line: &BomLine, outcome: TierOutcome) -> MappingDecision {
    let stage = determine_stage(
        line,
        outcome.selected.as_ref(),
        outcome.rule_applied.as_deref(),
    );

    let stamp = |mut c: ProcessCandidate| {
        if c.life_cycle_stage.is_none() {
            c.life_cycle_stage = Some(stage);
        }
        c
    };
    let selected = outcome.selected.map(stamp);
    let alternatives: Vec<ProcessCandidate> = outcome.alternatives.into_iter().map(stamp).collect();

    let mut candidates = Vec::with_capacity(alternatives.len() + 1);
    candidates.extend(selected.iter().cloned());
    candidates.extend(alternatives.iter().cloned());

    MappingDecision {
        bom_item_id: line.id.clone(),
        auto_selected: selected.is_some(),
        selected,
        alternatives,
        candidates,
        reasoning: outcome.reasoning,
        rule_applied: outcome.rule_applied,
        override_applied: false,
        confidence_score: outcome.confidence_score,
        life_cycle_stage: stage,
    }
}

/// Rebuilds a decision from a stored record.
///
/// The selected candidate is looked up in the stored candidate set by
/// dataset and provider; if it is missing a placeholder candidate is
/// synthesized from the flattened columns.
pub fn decision_from_record(record: &DecisionRecord) -> MappingDecision {
    let mut candidates = record.payload.candidates.clone();

    let mut selected_index = None;
    if let (Some(dataset_id), Some(provider)) =
        (&record.selected_dataset_id, &record.selected_provider)
    {
        selected_index = candidates
            .iter()
            .position(|c| &c.dataset_id == dataset_id && &c.provider == provider);
        if selected_index.is_none() {
            let placeholder = ProcessCandidate::new(
                provider.clone(),
                dataset_id.clone(),
                "Stored decision",
                record.confidence_score.unwrap_or(1.0),
                record
                    .rule_applied
                    .clone()
                    .unwrap_or_else(|| RULE_HISTORICAL.to_string()),
            )
            .with_description("Loaded from decision log")
            .with_metadata("decision_id", record.id);
            candidates.push(placeholder);
            selected_index = Some(candidates.len() - 1);
        }
    }

    let selected = selected_index.map(|i| candidates[i].clone());
    let alternatives = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != selected_index)
        .map(|(_, c)| c.clone())
        .collect();

    MappingDecision {
        bom_item_id: record.bom_item_id.clone(),
        selected,
        alternatives,
        candidates,
        reasoning: record
            .payload
            .reasoning
            .clone()
            .unwrap_or_else(|| "Historical decision".to_string()),
        rule_applied: record.rule_applied.clone(),
        auto_selected: record.auto_selected,
        override_applied: record.is_override,
        confidence_score: record.confidence_score,
        life_cycle_stage: record.payload.life_cycle_stage.unwrap_or_default(),
    }
}

/// Reduces a product's decision log to one effective record per BOM line:
/// the newest override if one exists, else the newest record. Output is
/// ordered by BOM line id.
pub fn select_effective_records(records: Vec<DecisionRecord>) -> Vec<DecisionRecord> {
    let mut latest: BTreeMap<String, DecisionRecord> = BTreeMap::new();
    let mut latest_override: BTreeMap<String, DecisionRecord> = BTreeMap::new();

    for record in records {
        let slot = if record.is_override {
            &mut latest_override
        } else {
            &mut latest
        };
        match slot.get(&record.bom_item_id) {
            Some(existing) if existing.recency_key() >= record.recency_key() => {}
            _ => {
                slot.insert(record.bom_item_id.clone(), record);
            }
        }
    }

    for (bom_item_id, record) in latest_override {
        latest.insert(bom_item_id, record);
    }
    latest.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::mapping_model::DecisionPayload;
    use chrono::NaiveDate;

    fn line() -> BomLine {
        BomLine::new("line-1", "prod-1", "Aluminium frame", 1.5)
    }

    fn candidate(dataset: &str, name: &str, confidence: f64) -> ProcessCandidate {
        ProcessCandidate::new("probas", dataset, name, confidence, "heuristic")
    }

    #[test]
    fn test_parse_catalog_identifier_variants() {
        assert_eq!(
            parse_catalog_identifier("soda4lca:abc-123"),
            Some(("abc-123".to_string(), None))
        );
        assert_eq!(
            parse_catalog_identifier("SODA4LCA:abc-123?version=01.00.000"),
            Some(("abc-123".to_string(), Some("01.00.000".to_string())))
        );
        assert_eq!(
            parse_catalog_identifier(" abc-123@2.1 "),
            Some(("abc-123".to_string(), Some("2.1".to_string())))
        );
        assert_eq!(parse_catalog_identifier("soda4lca:"), None);
        assert_eq!(parse_catalog_identifier("   "), None);
    }

    #[test]
    fn test_parse_catalog_identifier_non_ascii() {
        assert_eq!(
            parse_catalog_identifier("αβγδε-Stahl"),
            Some(("αβγδε-Stahl".to_string(), None))
        );
        assert_eq!(
            parse_catalog_identifier("Stahl-Übergang@1.0"),
            Some(("Stahl-Übergang".to_string(), Some("1.0".to_string())))
        );
        assert_eq!(
            parse_catalog_identifier("soda4lca:Ökobau-ü"),
            Some(("Ökobau-ü".to_string(), None))
        );
    }

    #[test]
    fn test_fuzzy_auto_selects_best() {
        let settings = MappingSettings::default();
        let outcome = select_fuzzy(
            "Aluminium frame",
            vec![
                candidate("a", "Copper wire", 0.65),
                candidate("b", "Aluminium frame", 0.5),
                candidate("c", "Unrelated", 0.1),
            ],
            &settings,
        );
        let selected = outcome.selected.unwrap();
        assert_eq!(selected.dataset_id, "b");
        assert_eq!(selected.confidence_score, 1.0);
        assert_eq!(outcome.rule_applied.as_deref(), Some(RULE_FUZZY_AUTO));
        assert_eq!(outcome.reasoning, "Auto-selected via fuzzy matching (1.00)");
        assert_eq!(outcome.alternatives.len(), 1);
        assert_eq!(outcome.alternatives[0].dataset_id, "a");
    }

    #[test]
    fn test_fuzzy_review_keeps_top_five() {
        let settings = MappingSettings::default();
        let candidates = (0..8)
            .map(|i| candidate(&format!("d{}", i), "zzz", 0.6 + i as f64 * 0.01))
            .collect();
        let outcome = select_fuzzy("Aluminium frame", candidates, &settings);
        assert!(outcome.selected.is_none());
        assert_eq!(outcome.alternatives.len(), MAX_REVIEW_CANDIDATES);
        assert_eq!(outcome.alternatives[0].dataset_id, "d7");
        assert_eq!(outcome.rule_applied.as_deref(), Some(RULE_FUZZY_REVIEW));
        assert!((outcome.confidence_score.unwrap() - 0.67).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_ties_keep_provider_order() {
        let settings = MappingSettings::default();
        let outcome = select_fuzzy(
            "qqq",
            vec![candidate("first", "zzz", 0.7), candidate("second", "yyy", 0.7)],
            &settings,
        );
        assert_eq!(outcome.alternatives[0].dataset_id, "first");
        assert_eq!(outcome.alternatives[1].dataset_id, "second");
    }

    #[test]
    fn test_fuzzy_no_candidates() {
        let outcome = select_fuzzy("x", Vec::new(), &MappingSettings::default());
        assert!(outcome.selected.is_none());
        assert!(outcome.alternatives.is_empty());
        assert_eq!(outcome.reasoning, "No candidates; manual mapping needed");
        assert_eq!(outcome.confidence_score, None);
    }

    #[test]
    fn test_determine_stage_rules() {
        let mut l = line();
        assert_eq!(
            determine_stage(&l, None, Some("rule")),
            LifeCycleStage::RawMaterials
        );

        l.supplier_id = Some("SUP-ACME".to_string());
        assert_eq!(
            determine_stage(&l, None, Some("rule")),
            LifeCycleStage::OwnOperations
        );
        assert_eq!(determine_stage(&l, None, None), LifeCycleStage::RawMaterials);

        let mut c = candidate("a", "A", 0.9);
        c.life_cycle_stage = Some(LifeCycleStage::UsePhase);
        assert_eq!(
            determine_stage(&l, Some(&c), Some("rule")),
            LifeCycleStage::UsePhase
        );
    }

    #[test]
    fn test_decision_from_outcome_stamps_stage() {
        let mut l = line();
        l.supplier_id = Some("SUP-ACME".to_string());
        let outcome = TierOutcome {
            selected: Some(candidate("a", "A", 0.9)),
            alternatives: vec![candidate("b", "B", 0.7)],
            rule_applied: Some("supplier_rule".to_string()),
            reasoning: "Supplier override for SUP-ACME".to_string(),
            confidence_score: Some(0.9),
        };
        let decision = decision_from_outcome(&l, outcome);
        assert_eq!(decision.life_cycle_stage, LifeCycleStage::OwnOperations);
        assert!(decision
            .candidates
            .iter()
            .all(|c| c.life_cycle_stage == Some(LifeCycleStage::OwnOperations)));
        assert_eq!(decision.candidates.len(), 2);
        assert!(decision.auto_selected);
        assert!(!decision.override_applied);
    }

    fn record(id: i64, item: &str, minute: u32, is_override: bool) -> DecisionRecord {
        DecisionRecord {
            id,
            product_id: "prod-1".to_string(),
            bom_item_id: item.to_string(),
            scenario_id: None,
            selected_dataset_id: Some(format!("ds-{}", id)),
            selected_provider: Some("probas".to_string()),
            confidence_score: Some(0.9),
            rule_applied: Some("r".to_string()),
            user_id: None,
            comment: None,
            auto_selected: !is_override,
            is_override,
            payload: DecisionPayload::default(),
            created_at: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(10, minute, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_decision_from_record_synthesizes_missing_selection() {
        let rec = record(42, "line-1", 0, false);
        let decision = decision_from_record(&rec);
        let selected = decision.selected.unwrap();
        assert_eq!(selected.name, "Stored decision");
        assert_eq!(selected.dataset_id, "ds-42");
        assert_eq!(selected.metadata["decision_id"], 42);
        assert_eq!(decision.reasoning, "Historical decision");
        assert_eq!(decision.candidates.len(), 1);
        assert!(decision.alternatives.is_empty());
    }

    #[test]
    fn test_decision_from_record_finds_stored_candidate() {
        let mut rec = record(7, "line-1", 0, false);
        rec.selected_dataset_id = Some("b".to_string());
        rec.payload.candidates = vec![candidate("a", "A", 0.7), candidate("b", "B", 0.9)];
        rec.payload.reasoning = Some("Matched material_code X".to_string());
        let decision = decision_from_record(&rec);
        assert_eq!(decision.selected.unwrap().name, "B");
        assert_eq!(decision.alternatives.len(), 1);
        assert_eq!(decision.alternatives[0].dataset_id, "a");
        assert_eq!(decision.reasoning, "Matched material_code X");
    }

    #[test]
    fn test_effective_records_prefer_override() {
        let records = vec![
            record(1, "line-1", 0, false),
            record(2, "line-1", 5, true),
            record(3, "line-1", 10, false),
            record(4, "line-2", 1, false),
            record(5, "line-2", 2, false),
        ];
        let effective = select_effective_records(records);
        assert_eq!(effective.len(), 2);
        assert_eq!(effective[0].id, 2);
        assert_eq!(effective[1].id, 5);
    }
}
