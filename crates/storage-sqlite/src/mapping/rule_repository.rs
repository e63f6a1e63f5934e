use std::sync::Arc;

use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::info;

use ecomap_core::errors::Result;
use ecomap_core::mapping::{MappingRule, MappingRuleRepositoryTrait};

use super::model::{MappingRuleDB, NewMappingRuleDB};
use super::seed::default_seed_rules;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::mapping_rules;
use crate::schema::mapping_rules::dsl::*;

pub struct MappingRuleRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl MappingRuleRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        MappingRuleRepository { pool, writer }
    }

    /// Rules narrowed by a SQL filter, in evaluation order.
    fn load_ordered<F>(&self, filter: F) -> Result<Vec<MappingRuleDB>>
    where
        F: FnOnce(
            mapping_rules::BoxedQuery<'static, diesel::sqlite::Sqlite>,
        ) -> mapping_rules::BoxedQuery<'static, diesel::sqlite::Sqlite>,
    {
        let mut conn = get_connection(&self.pool)?;
        filter(mapping_rules::table.into_boxed())
            .order((priority.asc(), id.asc()))
            .load::<MappingRuleDB>(&mut conn)
            .into_core()
    }

    /// Inserts the given rules, skipping any whose rule code already exists.
    /// Returns the number of rules added.
    pub async fn seed_rules(&self, rules: Vec<NewMappingRuleDB>) -> Result<usize> {
        let inserted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for rule in &rules {
                    inserted += diesel::insert_or_ignore_into(mapping_rules::table)
                        .values(rule)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(inserted)
            })
            .await?;
        info!("Seeded {} mapping rule(s)", inserted);
        Ok(inserted)
    }

    /// Seeds the built-in rule set. Safe to call on every start.
    pub async fn seed_defaults(&self) -> Result<usize> {
        self.seed_rules(default_seed_rules()?).await
    }
}

impl MappingRuleRepositoryTrait for MappingRuleRepository {
    fn rule_by_material_code(&self, code: &str) -> Result<Option<MappingRule>> {
        let code = code.to_string();
        let rules = self.load_ordered(|q| q.filter(material_code.eq(code)))?;
        Ok(rules.into_iter().next().map(MappingRule::from))
    }

    fn rule_by_family_prefix(
        &self,
        family: &str,
        classification_code: &str,
    ) -> Result<Option<MappingRule>> {
        let family_owned = family.to_string();
        let rules = self.load_ordered(|q| {
            q.filter(material_family.eq(family_owned))
                .filter(classification_prefix.is_not_null())
        })?;
        Ok(rules
            .into_iter()
            .map(MappingRule::from)
            .find(|rule| rule.matches_family_prefix(family, classification_code)))
    }

    fn rule_by_supplier(
        &self,
        supplier: &str,
        family: Option<&str>,
        code: Option<&str>,
    ) -> Result<Option<MappingRule>> {
        let supplier_owned = supplier.to_string();
        let rules = self.load_ordered(|q| q.filter(supplier_id.eq(supplier_owned)))?;
        Ok(rules
            .into_iter()
            .map(MappingRule::from)
            .find(|rule| rule.admits_supplier_line(supplier, family, code)))
    }

    fn list_rules(&self) -> Result<Vec<MappingRule>> {
        let rules = self.load_ordered(|q| q)?;
        Ok(rules.into_iter().map(MappingRule::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init, run_migrations, spawn_writer};
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, MappingRuleRepository) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("rules.db");
        let db_path = init(db_path.to_str().unwrap()).unwrap();
        let pool = create_pool(&db_path).unwrap();
        run_migrations(&pool).unwrap();
        let writer = spawn_writer((*pool).clone());
        (dir, MappingRuleRepository::new(pool, writer))
    }

    fn rule(code: &str, prio: i32) -> NewMappingRuleDB {
        NewMappingRuleDB {
            name: format!("Rule {}", code),
            rule_code: code.to_string(),
            priority: prio,
            material_code: None,
            material_family: None,
            classification_prefix: None,
            supplier_id: None,
            provider: "ProBas".to_string(),
            dataset_id: format!("prob:{}", code.to_lowercase()),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_seed_defaults_is_idempotent() {
        let (_dir, repo) = setup();
        let first = repo.seed_defaults().await.unwrap();
        assert!(first > 0);
        let second = repo.seed_defaults().await.unwrap();
        assert_eq!(second, 0);
        assert_eq!(repo.list_rules().unwrap().len(), first);
    }

    #[tokio::test]
    async fn test_seeded_aluminium_rule() {
        let (_dir, repo) = setup();
        repo.seed_defaults().await.unwrap();

        let rule = repo.rule_by_material_code("ALU-6000").unwrap().unwrap();
        assert_eq!(rule.dataset_id, "prob:aluminium-extrusion");
        assert_eq!(rule.provider, "ProBas");
        assert_eq!(rule.rule_code, "RULE-ALU-6000");
        assert!(repo.rule_by_material_code("UNKNOWN").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_material_code_lookup_respects_priority() {
        let (_dir, repo) = setup();
        let mut late = rule("LATE", 50);
        late.material_code = Some("STL".to_string());
        let mut early = rule("EARLY", 5);
        early.material_code = Some("STL".to_string());
        repo.seed_rules(vec![late, early]).await.unwrap();

        let found = repo.rule_by_material_code("STL").unwrap().unwrap();
        assert_eq!(found.rule_code, "EARLY");
    }

    #[tokio::test]
    async fn test_family_prefix_lookup() {
        let (_dir, repo) = setup();
        let mut no_prefix = rule("POLY-ANY", 1);
        no_prefix.material_family = Some("Polymer".to_string());
        let mut other_prefix = rule("POLY-14", 2);
        other_prefix.material_family = Some("Polymer".to_string());
        other_prefix.classification_prefix = Some("14".to_string());
        let mut matching = rule("POLY-1312", 3);
        matching.material_family = Some("Polymer".to_string());
        matching.classification_prefix = Some("1312".to_string());
        repo.seed_rules(vec![no_prefix, other_prefix, matching])
            .await
            .unwrap();

        let found = repo
            .rule_by_family_prefix("Polymer", "13121500")
            .unwrap()
            .unwrap();
        assert_eq!(found.rule_code, "POLY-1312");
        assert!(repo
            .rule_by_family_prefix("Steel", "13121500")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_supplier_lookup_skips_conflicting_rules() {
        let (_dir, repo) = setup();
        let mut steel_only = rule("ACME-STEEL", 1);
        steel_only.supplier_id = Some("SUP-ACME".to_string());
        steel_only.material_family = Some("Steel".to_string());
        let mut generic = rule("ACME-ANY", 2);
        generic.supplier_id = Some("SUP-ACME".to_string());
        repo.seed_rules(vec![steel_only, generic]).await.unwrap();

        let found = repo
            .rule_by_supplier("SUP-ACME", Some("Aluminum"), None)
            .unwrap()
            .unwrap();
        assert_eq!(found.rule_code, "ACME-ANY");

        let found = repo
            .rule_by_supplier("SUP-ACME", Some("Steel"), None)
            .unwrap()
            .unwrap();
        assert_eq!(found.rule_code, "ACME-STEEL");
    }
}
