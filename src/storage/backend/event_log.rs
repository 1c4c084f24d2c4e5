//! 事件日志存储（SeaORM）
//!
//! 每次点击一行写入 `click_events`，每批事件一个事务：
//! 任意一行插入失败则整批回滚（all-or-nothing）。
//! 时间桶计数在查询时由客户端聚合得到。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, ExprTrait, PaginatorTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::{debug, info};

use super::{connect_generic, connect_sqlite, infer_backend_from_url, run_migrations};
use crate::analytics::{AggregatedCount, ClickEvent, Granularity, aggregate_events};
use crate::config::DatabaseConfig;
use crate::errors::{ClickerError, Result};
use crate::storage::ClickStore;

use migration::entities::{click_event, click_total};

/// 单条 INSERT 语句携带的最大行数（SQLite 绑定参数数量有上限）
const INSERT_CHUNK_SIZE: usize = 500;

#[derive(Clone)]
pub struct EventLogStore {
    db: DatabaseConnection,
    backend_name: String,
    granularity: Granularity,
}

impl EventLogStore {
    /// 连接数据库并运行迁移
    pub async fn connect(config: &DatabaseConfig, granularity: Granularity) -> Result<Self> {
        let database_url = config.database_url.as_str();
        if database_url.is_empty() {
            return Err(ClickerError::configuration("database.database_url is not set"));
        }

        let backend_name = infer_backend_from_url(database_url)?;
        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(
                database_url,
                &backend_name,
                config.pool_size,
                Duration::from_secs(config.timeout),
            )
            .await?
        };

        run_migrations(&db).await?;

        info!("{} event log initialized", backend_name.to_uppercase());
        Ok(Self {
            db,
            backend_name,
            granularity,
        })
    }

    /// 获取数据库连接
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 查询 [from, to]（闭区间）内的原始点击事件，按时间升序
    pub async fn query_events(
        &self,
        entity_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ClickEvent>> {
        let rows = click_event::Entity::find()
            .filter(click_event::Column::EntityId.eq(entity_id))
            .filter(click_event::Column::OccurredAt.gte(from))
            .filter(click_event::Column::OccurredAt.lte(to))
            .order_by_asc(click_event::Column::OccurredAt)
            .order_by_asc(click_event::Column::Id)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ClickEvent::new(row.entity_id, row.occurred_at))
            .collect())
    }
}

#[async_trait]
impl ClickStore for EventLogStore {
    fn backend_name(&self) -> &str {
        &self.backend_name
    }

    async fn increment_total(&self, entity_id: i64) -> Result<u64> {
        let txn = self.db.begin().await?;

        // INSERT ... ON CONFLICT DO UPDATE total = total + 1，由数据库保证原子性
        let model = click_total::ActiveModel {
            entity_id: Set(entity_id),
            total: Set(1),
        };
        click_total::Entity::insert(model)
            .on_conflict(
                OnConflict::column(click_total::Column::EntityId)
                    .value(
                        click_total::Column::Total,
                        Expr::col(click_total::Column::Total).add(Expr::val(1i64)),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        // 同一事务内读回，拿到的是本次自增后的值
        let row = click_total::Entity::find_by_id(entity_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ClickerError::storage_unavailable(format!(
                    "click total row for entity {} vanished after upsert",
                    entity_id
                ))
            })?;

        txn.commit().await?;
        Ok(u64::try_from(row.total).unwrap_or(0))
    }

    async fn total_count(&self, entity_id: i64) -> Result<u64> {
        let count = click_event::Entity::find()
            .filter(click_event::Column::EntityId.eq(entity_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn apply_batch(&self, batch: &[ClickEvent]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // 任一 `?` 提前返回时事务被 drop，自动回滚
        let txn = self.db.begin().await?;

        for chunk in batch.chunks(INSERT_CHUNK_SIZE) {
            let models: Vec<click_event::ActiveModel> = chunk
                .iter()
                .map(|event| click_event::ActiveModel {
                    entity_id: Set(event.entity_id),
                    occurred_at: Set(event.occurred_at),
                    ..Default::default()
                })
                .collect();

            click_event::Entity::insert_many(models).exec(&txn).await?;
        }

        txn.commit().await?;

        debug!(
            "Click events written to {} database ({} records)",
            self.backend_name.to_uppercase(),
            batch.len()
        );
        Ok(())
    }

    async fn query_range(
        &self,
        entity_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AggregatedCount>> {
        let events = self.query_events(entity_id, from, to).await?;
        Ok(aggregate_events(entity_id, &events, self.granularity))
    }
}
