use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info, warn};
use serde_json::Value;

use super::mapping_constants::{
    DEFAULT_LCI_UNIT, DIRECT_CATALOG_CONFIDENCE, OVERRIDE_CONFIDENCE, RULE_CATALOG_DIRECT,
    RULE_DIRECT_DATASET, RULE_OVERRIDE,
};
use super::mapping_model::{
    DecisionSummary, LciEntry, LciModel, LifeCycleStage, MappingDecision, MappingError,
    MappingSettings, NewDecisionRecord, OverrideRequest, ProcessCandidate,
};
use super::mapping_resolution::{
    candidate_from_rule, decision_from_outcome, decision_from_record, direct_dataset_candidate,
    override_candidate, parse_catalog_identifier, select_fuzzy, TierOutcome,
};
use super::mapping_traits::{
    CandidateProvider, DatasetCacheTrait, MappingDecisionRepositoryTrait,
    MappingRuleRepositoryTrait, MappingServiceTrait, ProcessCatalog,
};
use super::similarity::build_query;
use crate::bom::BomLine;
use crate::errors::{Error, Result, ValidationError};
use crate::products::Product;
use crate::scenarios::Scenario;

/// Resolves BOM lines to LCI process datasets.
///
/// Tiers are tried in a fixed order and the first that yields an outcome
/// wins:
/// 1. Manual override stored for the line (returned as stored, nothing new
///    persisted)
/// 2. Dataset id carried on the BOM line
/// 3. Deterministic rules (material code, family + classification prefix,
///    supplier)
/// 4. Fuzzy matching across all candidate providers
pub struct MappingService {
    providers: Vec<Arc<dyn CandidateProvider>>,
    rule_repository: Arc<dyn MappingRuleRepositoryTrait>,
    decision_repository: Arc<dyn MappingDecisionRepositoryTrait>,
    catalog: Option<Arc<dyn ProcessCatalog>>,
    dataset_cache: Option<Arc<dyn DatasetCacheTrait>>,
    settings: MappingSettings,
}

impl MappingService {
    pub fn new(
        providers: Vec<Arc<dyn CandidateProvider>>,
        rule_repository: Arc<dyn MappingRuleRepositoryTrait>,
        decision_repository: Arc<dyn MappingDecisionRepositoryTrait>,
        settings: MappingSettings,
    ) -> Self {
        MappingService {
            providers,
            rule_repository,
            decision_repository,
            catalog: None,
            dataset_cache: None,
            settings,
        }
    }

    /// Remote catalog used to resolve BOM-supplied dataset ids.
    pub fn with_catalog(mut self, catalog: Arc<dyn ProcessCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Cache used to attach external references to candidates.
    pub fn with_dataset_cache(mut self, cache: Arc<dyn DatasetCacheTrait>) -> Self {
        self.dataset_cache = Some(cache);
        self
    }

    pub fn settings(&self) -> &MappingSettings {
        &self.settings
    }

    async fn direct_dataset_tier(&self, line: &BomLine) -> Option<TierOutcome> {
        let dataset_id = line
            .lci_dataset_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())?;

        if let Some(mut candidate) = self.lookup_catalog(dataset_id).await {
            candidate.confidence_score = DIRECT_CATALOG_CONFIDENCE;
            candidate.mapping_rule_id = RULE_CATALOG_DIRECT.to_string();
            return Some(TierOutcome::selected(
                candidate,
                RULE_CATALOG_DIRECT,
                "Dataset specified on BOM (soda4LCA)".to_string(),
            ));
        }

        Some(TierOutcome::selected(
            direct_dataset_candidate(dataset_id),
            RULE_DIRECT_DATASET,
            "Dataset specified on BOM".to_string(),
        ))
    }

    async fn lookup_catalog(&self, dataset_id: &str) -> Option<ProcessCandidate> {
        let catalog = self.catalog.as_ref()?;
        let (uuid, version) = parse_catalog_identifier(dataset_id)?;
        match catalog.get_process(&uuid, version.as_deref()).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Catalog lookup for dataset '{}' failed: {}", dataset_id, e);
                None
            }
        }
    }

    fn rule_tier(&self, line: &BomLine) -> Result<Option<TierOutcome>> {
        let code = non_blank(&line.material_code);
        let family = non_blank(&line.material_family);

        if let Some(code) = code {
            if let Some(rule) = self.rule_repository.rule_by_material_code(code)? {
                return Ok(Some(TierOutcome::selected(
                    candidate_from_rule(&rule),
                    &rule.rule_code,
                    format!("Matched material_code {}", code),
                )));
            }
        }

        if let (Some(family), Some(classification)) = (family, non_blank(&line.classification_code))
        {
            if let Some(rule) = self
                .rule_repository
                .rule_by_family_prefix(family, classification)?
            {
                return Ok(Some(TierOutcome::selected(
                    candidate_from_rule(&rule),
                    &rule.rule_code,
                    format!(
                        "Matched family {} and classification {}",
                        family, classification
                    ),
                )));
            }
        }

        if let Some(supplier) = non_blank(&line.supplier_id) {
            if let Some(rule) = self
                .rule_repository
                .rule_by_supplier(supplier, family, code)?
            {
                return Ok(Some(TierOutcome::selected(
                    candidate_from_rule(&rule),
                    &rule.rule_code,
                    format!("Supplier override for {}", supplier),
                )));
            }
        }

        Ok(None)
    }

    async fn fuzzy_tier(&self, line: &BomLine) -> TierOutcome {
        let results = join_all(self.providers.iter().map(|p| p.find_candidates(line))).await;

        let mut candidates = Vec::new();
        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(found) => candidates.extend(found),
                Err(e) => warn!(
                    "Provider '{}' failed for BOM item {}: {}",
                    provider.name(),
                    line.id,
                    e
                ),
            }
        }

        select_fuzzy(&build_query(line), candidates, &self.settings)
    }

    async fn enrich(&self, candidate: &mut ProcessCandidate) {
        let Some(cache) = self.dataset_cache.as_ref() else {
            return;
        };
        if candidate.external_reference.is_some() {
            return;
        }
        match cache
            .build_reference(&candidate.provider, &candidate.dataset_id)
            .await
        {
            Ok(reference) => candidate.external_reference = Some(reference),
            Err(e) => {
                warn!(
                    "Could not cache dataset {}/{}: {}",
                    candidate.provider, candidate.dataset_id, e
                );
                candidate.push_warning(e.to_string());
            }
        }
    }

    async fn enrich_decision(&self, decision: &mut MappingDecision) {
        if self.dataset_cache.is_none() {
            return;
        }
        if let Some(selected) = decision.selected.as_mut() {
            self.enrich(selected).await;
        }
        for alternative in decision.alternatives.iter_mut() {
            self.enrich(alternative).await;
        }
        decision.candidates = decision
            .selected
            .iter()
            .chain(decision.alternatives.iter())
            .cloned()
            .collect();
    }

    async fn resolve_line(
        &self,
        line: &BomLine,
        scenario_id: Option<&str>,
    ) -> Result<MappingDecision> {
        if let Some(record) = self.decision_repository.get_latest_override(&line.id)? {
            debug!("BOM item {} uses stored override {}", line.id, record.id);
            return Ok(decision_from_record(&record));
        }

        let outcome = match self.direct_dataset_tier(line).await {
            Some(outcome) => outcome,
            None => match self.rule_tier(line)? {
                Some(outcome) => outcome,
                None => self.fuzzy_tier(line).await,
            },
        };
        debug!(
            "BOM item {} resolved by {:?}: {}",
            line.id, outcome.rule_applied, outcome.reasoning
        );

        let mut decision = decision_from_outcome(line, outcome);
        self.enrich_decision(&mut decision).await;

        self.decision_repository
            .record_decision(NewDecisionRecord::automatic(line, scenario_id, &decision))
            .await?;
        Ok(decision)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl MappingServiceTrait for MappingService {
    async fn resolve(
        &self,
        lines: &[BomLine],
        scenario: Option<&Scenario>,
    ) -> Result<Vec<MappingDecision>> {
        let scenario_id = scenario.map(|s| s.id.as_str());
        let mut decisions = Vec::with_capacity(lines.len());
        for line in lines {
            decisions.push(self.resolve_line(line, scenario_id).await?);
        }
        info!(
            "Resolved {} BOM lines ({} selected)",
            decisions.len(),
            decisions.iter().filter(|d| d.selected.is_some()).count()
        );
        Ok(decisions)
    }

    async fn record_override(
        &self,
        line: &BomLine,
        request: OverrideRequest,
    ) -> Result<MappingDecision> {
        if request.dataset_id.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "dataset_id".to_string(),
            )));
        }
        if request.provider.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "provider".to_string(),
            )));
        }

        let stage = LifeCycleStage::normalize(request.life_cycle_stage.as_deref());
        let mut candidate = override_candidate(
            request.provider.trim(),
            request.dataset_id.trim(),
            request.user_id.as_deref(),
            stage,
        );
        self.enrich(&mut candidate).await;

        let decision = MappingDecision {
            bom_item_id: line.id.clone(),
            selected: Some(candidate.clone()),
            alternatives: Vec::new(),
            candidates: vec![candidate],
            reasoning: format!(
                "Manual override by {}",
                request.user_id.as_deref().unwrap_or("system")
            ),
            rule_applied: Some(RULE_OVERRIDE.to_string()),
            auto_selected: false,
            override_applied: true,
            confidence_score: Some(OVERRIDE_CONFIDENCE),
            life_cycle_stage: stage,
        };

        self.decision_repository
            .record_decision(NewDecisionRecord::manual_override(
                line,
                request.scenario_id.as_deref(),
                &decision,
                request.user_id.as_deref(),
                request.comment.as_deref(),
            ))
            .await?;
        info!(
            "Override recorded for BOM item {} -> {}/{}",
            line.id, request.provider, request.dataset_id
        );
        Ok(decision)
    }

    fn load_latest_decisions(&self, product_id: &str) -> Result<Vec<MappingDecision>> {
        let records = self
            .decision_repository
            .latest_decisions_for_product(product_id)?;
        Ok(records.iter().map(decision_from_record).collect())
    }

    fn list_history(&self, product_id: &str) -> Result<Vec<DecisionSummary>> {
        let records = self
            .decision_repository
            .list_history_for_product(product_id)?;
        Ok(records.iter().map(|r| r.summary()).collect())
    }

    async fn build_lci_model(
        &self,
        product: &Product,
        lines: &[BomLine],
        scenario: Option<&Scenario>,
    ) -> Result<(LciModel, Vec<MappingDecision>)> {
        let mut stored: HashMap<String, MappingDecision> = self
            .load_latest_decisions(&product.id)?
            .into_iter()
            .map(|d| (d.bom_item_id.clone(), d))
            .collect();
        let mut decisions: Vec<MappingDecision> = lines
            .iter()
            .filter_map(|line| stored.remove(line.id.as_str()))
            .collect();

        if decisions.len() < lines.len() {
            debug!(
                "Product {} has {} stored decisions for {} lines; resolving",
                product.id,
                decisions.len(),
                lines.len()
            );
            decisions = self.resolve(lines, scenario).await?;
        }

        let by_item: HashMap<&str, &MappingDecision> = decisions
            .iter()
            .map(|d| (d.bom_item_id.as_str(), d))
            .collect();

        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            let selected = by_item
                .get(line.id.as_str())
                .and_then(|d| d.selected.as_ref().map(|s| (*d, s)));
            let Some((decision, selected)) = selected else {
                return Err(MappingError::UnconfirmedMapping {
                    bom_item_id: line.id.clone(),
                }
                .into());
            };

            let mut metadata = selected.metadata.clone();
            if let Some(rule) = &decision.rule_applied {
                metadata.insert("rule_applied".to_string(), Value::String(rule.clone()));
            }
            metadata.insert(
                "auto_selected".to_string(),
                Value::Bool(decision.auto_selected),
            );

            entries.push(LciEntry {
                bom_item_id: line.id.clone(),
                dataset_id: selected.dataset_id.clone(),
                provider: selected.provider.clone(),
                quantity: line.quantity,
                unit: line
                    .unit
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LCI_UNIT.to_string()),
                mass_kg: line.mass_kg,
                life_cycle_stage: decision.life_cycle_stage,
                external_reference: selected.external_reference.clone(),
                metadata,
            });
        }

        let model = LciModel {
            product_id: product.id.clone(),
            lines: lines.to_vec(),
            entries,
        };
        Ok((model, decisions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::mapping_constants::{
        RULE_CONFIDENCE, RULE_FUZZY_AUTO, RULE_FUZZY_REVIEW,
    };
    use crate::mapping::mapping_model::{
        DatasetReference, DecisionRecord, MappingRule,
    };
    use crate::mapping::mapping_resolution::select_effective_records;
    use crate::StatusKind;
    use chrono::{Duration, NaiveDate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::RwLock;

    // ============== Mock Repositories ==============

    struct MockRuleRepository {
        rules: RwLock<Vec<MappingRule>>,
    }

    impl MockRuleRepository {
        fn new(mut rules: Vec<MappingRule>) -> Self {
            rules.sort_by_key(|r| r.priority);
            Self {
                rules: RwLock::new(rules),
            }
        }

        fn first(&self, pred: impl Fn(&MappingRule) -> bool) -> Result<Option<MappingRule>> {
            Ok(self.rules.read().unwrap().iter().find(|r| pred(r)).cloned())
        }
    }

    impl MappingRuleRepositoryTrait for MockRuleRepository {
        fn rule_by_material_code(&self, material_code: &str) -> Result<Option<MappingRule>> {
            self.first(|r| r.material_code.as_deref() == Some(material_code))
        }

        fn rule_by_family_prefix(
            &self,
            material_family: &str,
            classification_code: &str,
        ) -> Result<Option<MappingRule>> {
            self.first(|r| r.matches_family_prefix(material_family, classification_code))
        }

        fn rule_by_supplier(
            &self,
            supplier_id: &str,
            material_family: Option<&str>,
            material_code: Option<&str>,
        ) -> Result<Option<MappingRule>> {
            self.first(|r| r.admits_supplier_line(supplier_id, material_family, material_code))
        }

        fn list_rules(&self) -> Result<Vec<MappingRule>> {
            Ok(self.rules.read().unwrap().clone())
        }
    }

    struct MockDecisionRepository {
        records: RwLock<Vec<DecisionRecord>>,
    }

    impl MockDecisionRepository {
        fn new() -> Self {
            Self {
                records: RwLock::new(Vec::new()),
            }
        }

        fn count(&self) -> usize {
            self.records.read().unwrap().len()
        }

        fn latest(&self, pred: impl Fn(&DecisionRecord) -> bool) -> Option<DecisionRecord> {
            self.records
                .read()
                .unwrap()
                .iter()
                .filter(|r| pred(r))
                .max_by_key(|r| r.recency_key())
                .cloned()
        }
    }

    #[async_trait]
    impl MappingDecisionRepositoryTrait for MockDecisionRepository {
        fn get_latest_decision(&self, bom_item_id: &str) -> Result<Option<DecisionRecord>> {
            Ok(self.latest(|r| r.bom_item_id == bom_item_id))
        }

        fn get_latest_override(&self, bom_item_id: &str) -> Result<Option<DecisionRecord>> {
            Ok(self.latest(|r| r.bom_item_id == bom_item_id && r.is_override))
        }

        fn latest_decisions_for_product(&self, product_id: &str) -> Result<Vec<DecisionRecord>> {
            Ok(select_effective_records(
                self.list_history_for_product(product_id)?,
            ))
        }

        fn list_history_for_product(&self, product_id: &str) -> Result<Vec<DecisionRecord>> {
            let mut records: Vec<DecisionRecord> = self
                .records
                .read()
                .unwrap()
                .iter()
                .filter(|r| r.product_id == product_id)
                .cloned()
                .collect();
            records.sort_by_key(|r| std::cmp::Reverse(r.recency_key()));
            Ok(records)
        }

        async fn record_decision(&self, record: NewDecisionRecord) -> Result<DecisionRecord> {
            let mut records = self.records.write().unwrap();
            let id = records.len() as i64 + 1;
            let created_at = NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
                + Duration::seconds(id);
            let stored = DecisionRecord {
                id,
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
                payload: record.payload,
                created_at,
            };
            records.push(stored.clone());
            Ok(stored)
        }
    }

    struct StaticProvider {
        name: String,
        candidates: Vec<ProcessCandidate>,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        fn new(name: &str, candidates: Vec<ProcessCandidate>) -> Self {
            Self {
                name: name.to_string(),
                candidates,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CandidateProvider for StaticProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn find_candidates(&self, _line: &BomLine) -> Result<Vec<ProcessCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.candidates.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CandidateProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn find_candidates(&self, _line: &BomLine) -> Result<Vec<ProcessCandidate>> {
            Err(Error::External("connection refused".to_string()))
        }
    }

    struct MockCatalog {
        known_uuid: String,
    }

    #[async_trait]
    impl ProcessCatalog for MockCatalog {
        async fn get_process(
            &self,
            uuid: &str,
            version: Option<&str>,
        ) -> Result<Option<ProcessCandidate>> {
            if uuid != self.known_uuid {
                return Ok(None);
            }
            let dataset_id = match version {
                Some(v) => format!("soda4lca:{}?version={}", uuid, v),
                None => format!("soda4lca:{}", uuid),
            };
            Ok(Some(ProcessCandidate::new(
                "soda4lca",
                dataset_id,
                "Aluminium ingot",
                0.99,
                "soda4lca_uuid",
            )))
        }
    }

    struct MockCache {
        fail: bool,
    }

    #[async_trait]
    impl DatasetCacheTrait for MockCache {
        async fn build_reference(
            &self,
            provider: &str,
            dataset_id: &str,
        ) -> Result<DatasetReference> {
            if self.fail {
                return Err(Error::External("catalog unreachable".to_string()));
            }
            Ok(DatasetReference {
                database: format!("soda4lca:{}", provider.to_lowercase()),
                code: dataset_id.to_string(),
                source: "soda4lca".to_string(),
                cache_path: format!("/tmp/{}/{}.ilcd.json", provider, dataset_id),
            })
        }
    }

    // ============== Fixtures ==============

    fn rule(
        id: &str,
        code: &str,
        priority: i32,
        dataset: &str,
        edit: impl FnOnce(&mut MappingRule),
    ) -> MappingRule {
        let mut rule = MappingRule {
            id: id.to_string(),
            name: format!("Rule {}", id),
            rule_code: code.to_string(),
            priority,
            material_code: None,
            material_family: None,
            classification_prefix: None,
            supplier_id: None,
            provider: "probas".to_string(),
            dataset_id: dataset.to_string(),
            description: None,
        };
        edit(&mut rule);
        rule
    }

    fn seeded_rules() -> Vec<MappingRule> {
        vec![
            rule("r-alu", "alu_extrusion_code", 10, "prob:aluminium-extrusion", |r| {
                r.material_code = Some("ALU-6000".to_string());
            }),
            rule("r-alu-late", "alu_late", 50, "prob:other", |r| {
                r.material_code = Some("ALU-6000".to_string());
            }),
            rule("r-poly", "polymer_family", 20, "prob:polymer-moulding", |r| {
                r.material_family = Some("Polymer".to_string());
                r.classification_prefix = Some("1312".to_string());
            }),
            rule("r-acme", "acme_supplier", 30, "acme:steel-parts", |r| {
                r.supplier_id = Some("SUP-ACME".to_string());
                r.material_family = Some("Steel".to_string());
            }),
        ]
    }

    fn line(id: &str, description: &str) -> BomLine {
        BomLine::new(id, "prod-1", description, 1.0)
    }

    struct Harness {
        service: MappingService,
        decisions: Arc<MockDecisionRepository>,
    }

    fn harness(providers: Vec<Arc<dyn CandidateProvider>>) -> Harness {
        let decisions = Arc::new(MockDecisionRepository::new());
        let service = MappingService::new(
            providers,
            Arc::new(MockRuleRepository::new(seeded_rules())),
            decisions.clone(),
            MappingSettings::default(),
        );
        Harness { service, decisions }
    }

    fn fuzzy_provider() -> Arc<dyn CandidateProvider> {
        Arc::new(StaticProvider::new(
            "probas",
            vec![
                ProcessCandidate::new("probas", "prob_frame", "Steel bracket", 0.5, "h")
                    .with_description("welded"),
                ProcessCandidate::new("probas", "prob_misc", "Generic part", 0.62, "h"),
            ],
        ))
    }

    // ============== Tests ==============

    #[tokio::test]
    async fn test_one_decision_per_line_in_order() {
        let h = harness(vec![fuzzy_provider()]);
        let mut alu = line("a", "Frame");
        alu.material_code = Some("ALU-6000".to_string());
        let lines = vec![line("z", "Steel bracket"), alu, line("m", "Mystery")];

        let decisions = h.service.resolve(&lines, None).await.unwrap();
        let ids: Vec<&str> = decisions.iter().map(|d| d.bom_item_id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        assert_eq!(h.decisions.count(), 3);
    }

    #[tokio::test]
    async fn test_material_code_rule_uses_lowest_priority() {
        let h = harness(vec![fuzzy_provider()]);
        let mut l = line("l1", "Extruded frame");
        l.material_code = Some("ALU-6000".to_string());

        let decision = h.service.resolve(&[l], None).await.unwrap().remove(0);
        let selected = decision.selected.unwrap();
        assert_eq!(selected.dataset_id, "prob:aluminium-extrusion");
        assert_eq!(selected.mapping_rule_id, "alu_extrusion_code");
        assert_eq!(decision.confidence_score, Some(RULE_CONFIDENCE));
        assert_eq!(decision.rule_applied.as_deref(), Some("alu_extrusion_code"));
        assert_eq!(decision.reasoning, "Matched material_code ALU-6000");
        assert!(decision.alternatives.is_empty());
        assert_eq!(selected.metadata["rule_id"], "r-alu");
    }

    #[tokio::test]
    async fn test_rule_tier_beats_fuzzy_tier() {
        let provider = Arc::new(StaticProvider::new(
            "probas",
            vec![ProcessCandidate::new("probas", "prob_x", "Polymer housing", 0.99, "h")],
        ));
        let h = harness(vec![provider.clone()]);
        let mut l = line("l1", "Polymer housing");
        l.material_family = Some("Polymer".to_string());
        l.classification_code = Some("13121501".to_string());

        let decision = h.service.resolve(&[l], None).await.unwrap().remove(0);
        assert_eq!(
            decision.selected.unwrap().dataset_id,
            "prob:polymer-moulding"
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_supplier_rule_sets_own_operations_stage() {
        let h = harness(vec![]);
        let mut l = line("l1", "Bracket");
        l.supplier_id = Some("SUP-ACME".to_string());
        l.material_family = Some("Steel".to_string());

        let decision = h.service.resolve(&[l.clone()], None).await.unwrap().remove(0);
        assert_eq!(decision.reasoning, "Supplier override for SUP-ACME");
        assert_eq!(decision.life_cycle_stage, LifeCycleStage::OwnOperations);

        l.id = "l2".to_string();
        l.material_family = Some("Polymer".to_string());
        let decision = h.service.resolve(&[l], None).await.unwrap().remove(0);
        assert!(decision.selected.is_none());
    }

    #[tokio::test]
    async fn test_direct_dataset_without_catalog() {
        let h = harness(vec![fuzzy_provider()]);
        let mut l = line("l1", "Cable");
        l.material_code = Some("ALU-6000".to_string());
        l.lci_dataset_id = Some("ecoinvent:1234".to_string());

        let decision = h.service.resolve(&[l], None).await.unwrap().remove(0);
        let selected = decision.selected.unwrap();
        assert_eq!(selected.provider, "manual");
        assert_eq!(selected.dataset_id, "ecoinvent:1234");
        assert_eq!(selected.confidence_score, 0.9);
        assert_eq!(selected.metadata["source"], "bom");
        assert_eq!(decision.rule_applied.as_deref(), Some(RULE_DIRECT_DATASET));
        assert_eq!(decision.reasoning, "Dataset specified on BOM");
    }

    #[tokio::test]
    async fn test_direct_dataset_resolved_through_catalog() {
        let uuid = "0f4a2c1e-6a3b-4f9e-8d7c-5b1a2e3f4d6c";
        let h = harness(vec![]);
        let service = h.service.with_catalog(Arc::new(MockCatalog {
            known_uuid: uuid.to_string(),
        }));

        let mut l = line("l1", "Ingot");
        l.lci_dataset_id = Some(format!("soda4lca:{}@03.00.001", uuid));
        let decision = service.resolve(&[l.clone()], None).await.unwrap().remove(0);
        let selected = decision.selected.unwrap();
        assert_eq!(selected.provider, "soda4lca");
        assert_eq!(selected.confidence_score, DIRECT_CATALOG_CONFIDENCE);
        assert_eq!(selected.mapping_rule_id, RULE_CATALOG_DIRECT);
        assert_eq!(
            selected.dataset_id,
            format!("soda4lca:{}?version=03.00.001", uuid)
        );

        l.id = "l2".to_string();
        l.lci_dataset_id = Some("soda4lca:unknown".to_string());
        let decision = service.resolve(&[l], None).await.unwrap().remove(0);
        assert_eq!(decision.selected.unwrap().provider, "manual");
    }

    #[tokio::test]
    async fn test_fuzzy_auto_and_review_thresholds() {
        let h = harness(vec![fuzzy_provider()]);
        let mut auto_line = line("auto", "Steel bracket welded");
        auto_line.material_family = Some("Steel".to_string());
        let review_line = line("review", "Something else");

        let decisions = h
            .service
            .resolve(&[auto_line, review_line], None)
            .await
            .unwrap();

        let auto = &decisions[0];
        assert_eq!(auto.rule_applied.as_deref(), Some(RULE_FUZZY_AUTO));
        assert!(auto.confidence_score.unwrap() >= h.service.settings().min_auto);
        assert_eq!(auto.selected.as_ref().unwrap().dataset_id, "prob_frame");

        let review = &decisions[1];
        assert!(review.selected.is_none());
        assert!(!review.auto_selected);
        assert_eq!(review.rule_applied.as_deref(), Some(RULE_FUZZY_REVIEW));
        let best = review.alternatives[0].confidence_score;
        assert!(best >= h.service.settings().min_candidate);
        assert!(best < h.service.settings().min_auto);
    }

    #[tokio::test]
    async fn test_failing_provider_does_not_abort() {
        let h = harness(vec![Arc::new(FailingProvider), fuzzy_provider()]);
        let mut l = line("l1", "Steel bracket welded");
        l.material_family = Some("Steel".to_string());
        let decision = h.service.resolve(&[l], None).await.unwrap().remove(0);
        assert!(decision.selected.is_some());
    }

    #[tokio::test]
    async fn test_no_candidates_needs_manual_mapping() {
        let h = harness(vec![]);
        let decision = h
            .service
            .resolve(&[line("l1", "Widget")], None)
            .await
            .unwrap()
            .remove(0);
        assert!(decision.selected.is_none());
        assert_eq!(decision.reasoning, "No candidates; manual mapping needed");
        assert_eq!(decision.life_cycle_stage, LifeCycleStage::RawMaterials);
        assert_eq!(h.decisions.count(), 1);
    }

    #[tokio::test]
    async fn test_override_supersedes_later_resolution() {
        let h = harness(vec![fuzzy_provider()]);
        let mut l = line("l1", "Frame");
        l.material_code = Some("ALU-6000".to_string());

        h.service.resolve(&[l.clone()], None).await.unwrap();
        let overridden = h
            .service
            .record_override(
                &l,
                OverrideRequest {
                    dataset_id: "custom:y".to_string(),
                    provider: "acme".to_string(),
                    user_id: Some("analyst".to_string()),
                    comment: Some("supplier EPD".to_string()),
                    life_cycle_stage: Some("Use-Phase".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(overridden.override_applied);
        assert!(!overridden.auto_selected);
        assert_eq!(overridden.reasoning, "Manual override by analyst");
        assert_eq!(overridden.life_cycle_stage, LifeCycleStage::UsePhase);

        let before = h.decisions.count();
        let again = h.service.resolve(&[l], None).await.unwrap().remove(0);
        assert_eq!(h.decisions.count(), before);
        let selected = again.selected.unwrap();
        assert_eq!(selected.dataset_id, "custom:y");
        assert_eq!(selected.provider, "acme");
        assert!(again.override_applied);
        assert_eq!(again.reasoning, "Manual override by analyst");
        assert_eq!(again.life_cycle_stage, LifeCycleStage::UsePhase);
    }

    #[tokio::test]
    async fn test_newest_override_wins() {
        let h = harness(vec![]);
        let l = line("l1", "Frame");
        for dataset in ["first", "second"] {
            h.service
                .record_override(
                    &l,
                    OverrideRequest {
                        dataset_id: dataset.to_string(),
                        provider: "acme".to_string(),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let decision = h.service.resolve(&[l], None).await.unwrap().remove(0);
        assert_eq!(decision.selected.unwrap().dataset_id, "second");
        assert_eq!(decision.reasoning, "Manual override by system");
    }

    #[tokio::test]
    async fn test_override_requires_dataset() {
        let h = harness(vec![]);
        let err = h
            .service
            .record_override(&line("l1", "x"), OverrideRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_kind(), StatusKind::Invalid);
    }

    #[tokio::test]
    async fn test_cache_failure_recorded_as_warning() {
        let h = harness(vec![]);
        let service = h
            .service
            .with_dataset_cache(Arc::new(MockCache { fail: true }));
        let mut l = line("l1", "Frame");
        l.material_code = Some("ALU-6000".to_string());

        let decision = service.resolve(&[l], None).await.unwrap().remove(0);
        let selected = decision.selected.unwrap();
        assert!(selected.external_reference.is_none());
        assert_eq!(selected.warnings(), vec!["External data source failed: catalog unreachable"]);
        assert_eq!(decision.candidates[0].warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_success_attaches_reference() {
        let h = harness(vec![]);
        let service = h
            .service
            .with_dataset_cache(Arc::new(MockCache { fail: false }));
        let mut l = line("l1", "Frame");
        l.material_code = Some("ALU-6000".to_string());

        let decision = service.resolve(&[l], None).await.unwrap().remove(0);
        let reference = decision.selected.unwrap().external_reference.unwrap();
        assert_eq!(reference.database, "soda4lca:probas");
        assert_eq!(reference.code, "prob:aluminium-extrusion");
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let h = harness(vec![]);
        let mut l = line("l1", "Frame");
        l.material_code = Some("ALU-6000".to_string());
        h.service.resolve(&[l.clone()], None).await.unwrap();
        h.service
            .record_override(
                &l,
                OverrideRequest {
                    dataset_id: "custom:y".to_string(),
                    provider: "acme".to_string(),
                    comment: Some("checked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let history = h.service.list_history("prod-1").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].is_override);
        assert_eq!(history[0].comment.as_deref(), Some("checked"));
        assert_eq!(history[1].rule_applied.as_deref(), Some("alu_extrusion_code"));
    }

    #[tokio::test]
    async fn test_build_lci_model_reuses_stored_decisions() {
        let h = harness(vec![]);
        let product = Product::new("prod-1", "Bike");
        let mut l = line("l1", "Frame");
        l.material_code = Some("ALU-6000".to_string());
        l.unit = None;
        l.quantity = 2.0;

        let (model, _) = h
            .service
            .build_lci_model(&product, &[l.clone()], None)
            .await
            .unwrap();
        assert_eq!(h.decisions.count(), 1);
        assert_eq!(model.entries.len(), 1);
        let entry = &model.entries[0];
        assert_eq!(entry.dataset_id, "prob:aluminium-extrusion");
        assert_eq!(entry.unit, "ea");
        assert_eq!(entry.quantity, 2.0);
        assert_eq!(entry.metadata["rule_applied"], "alu_extrusion_code");
        assert_eq!(entry.metadata["auto_selected"], true);

        h.service
            .build_lci_model(&product, &[l], None)
            .await
            .unwrap();
        assert_eq!(h.decisions.count(), 1);
    }

    #[tokio::test]
    async fn test_build_lci_model_keeps_input_order_for_stored_decisions() {
        let h = harness(vec![]);
        let product = Product::new("prod-1", "Bike");
        let lines: Vec<BomLine> = ["z", "a", "m"]
            .iter()
            .map(|id| {
                let mut l = line(id, "Frame");
                l.material_code = Some("ALU-6000".to_string());
                l
            })
            .collect();

        h.service.resolve(&lines, None).await.unwrap();
        assert_eq!(h.decisions.count(), 3);

        let (model, decisions) = h
            .service
            .build_lci_model(&product, &lines, None)
            .await
            .unwrap();
        assert_eq!(h.decisions.count(), 3);
        let decision_ids: Vec<&str> = decisions.iter().map(|d| d.bom_item_id.as_str()).collect();
        let entry_ids: Vec<&str> = model.entries.iter().map(|e| e.bom_item_id.as_str()).collect();
        assert_eq!(decision_ids, vec!["z", "a", "m"]);
        assert_eq!(entry_ids, decision_ids);
    }

    #[tokio::test]
    async fn test_build_lci_model_fails_without_confirmed_mapping() {
        let h = harness(vec![]);
        let product = Product::new("prod-1", "Bike");
        let err = h
            .service
            .build_lci_model(&product, &[line("l9", "Widget")], None)
            .await
            .unwrap_err();
        assert_eq!(err.status_kind(), StatusKind::PreconditionFailed);
        assert!(err.to_string().contains("l9"));
    }
}
