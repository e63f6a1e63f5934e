use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::SqliteConnection;
use log::debug;

use ecomap_core::errors::Result;
use ecomap_core::mapping::{DecisionRecord, MappingDecisionRepositoryTrait, NewDecisionRecord};

use super::model::{MappingDecisionDB, NewMappingDecisionDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::mapping_decisions;
use crate::schema::mapping_decisions::dsl::*;

/// Append-only decision log. Rows are never updated or deleted.
pub struct MappingDecisionRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl MappingDecisionRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        MappingDecisionRepository { pool, writer }
    }

    fn latest_for_item(&self, item_id: &str, overrides_only: bool) -> Result<Option<DecisionRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = mapping_decisions
            .filter(bom_item_id.eq(item_id))
            .into_boxed();
        if overrides_only {
            query = query.filter(is_override.eq(true));
        }
        let row = query
            .order((created_at.desc(), id.desc()))
            .first::<MappingDecisionDB>(&mut conn)
            .optional()
            .into_core()?;
        row.map(MappingDecisionDB::into_record).transpose()
    }

    fn load_for_product(&self, product: &str) -> Result<Vec<DecisionRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = mapping_decisions
            .filter(product_id.eq(product))
            .order((created_at.desc(), id.desc()))
            .load::<MappingDecisionDB>(&mut conn)
            .into_core()?;
        rows.into_iter().map(MappingDecisionDB::into_record).collect()
    }

    /// One row per BOM line: the newest override if any, else the newest row.
    fn load_effective_for_product(&self, product: &str) -> Result<Vec<DecisionRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sql_query(
            "WITH RankedDecisions AS ( \
                SELECT \
                    id, product_id, bom_item_id, scenario_id, selected_dataset_id, \
                    selected_provider, confidence_score, rule_applied, user_id, comment, \
                    auto_selected, is_override, decision_payload, created_at, \
                    ROW_NUMBER() OVER ( \
                        PARTITION BY bom_item_id \
                        ORDER BY is_override DESC, created_at DESC, id DESC \
                    ) as rn \
                FROM mapping_decisions \
                WHERE product_id = ? \
            ) \
            SELECT \
                id, product_id, bom_item_id, scenario_id, selected_dataset_id, \
                selected_provider, confidence_score, rule_applied, user_id, comment, \
                auto_selected, is_override, decision_payload, created_at \
            FROM RankedDecisions \
            WHERE rn = 1 \
            ORDER BY bom_item_id",
        )
        .bind::<Text, _>(product)
        .load::<MappingDecisionDB>(&mut conn)
        .into_core()?;
        rows.into_iter().map(MappingDecisionDB::into_record).collect()
    }
}

#[async_trait]
impl MappingDecisionRepositoryTrait for MappingDecisionRepository {
    fn get_latest_decision(&self, item_id: &str) -> Result<Option<DecisionRecord>> {
        self.latest_for_item(item_id, false)
    }

    fn get_latest_override(&self, item_id: &str) -> Result<Option<DecisionRecord>> {
        self.latest_for_item(item_id, true)
    }

    fn latest_decisions_for_product(&self, product: &str) -> Result<Vec<DecisionRecord>> {
        self.load_effective_for_product(product)
    }

    fn list_history_for_product(&self, product: &str) -> Result<Vec<DecisionRecord>> {
        self.load_for_product(product)
    }

    async fn record_decision(&self, record: NewDecisionRecord) -> Result<DecisionRecord> {
        let row = NewMappingDecisionDB::from_domain(record, Utc::now().naive_utc())?;
        let stored = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<MappingDecisionDB> {
                Ok(diesel::insert_into(mapping_decisions::table)
                    .values(&row)
                    .returning(MappingDecisionDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?)
            })
            .await?;
        debug!(
            "Recorded decision {} for BOM item {} (override: {})",
            stored.id, stored.bom_item_id, stored.is_override
        );
        stored.into_record()
    }
}
