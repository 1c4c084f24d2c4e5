//! 点击事件表迁移
//!
//! 创建 click_events 表（事件日志存储），每次点击一行：
//! - entity_id: banner ID
//! - occurred_at: 点击时间

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClickEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ClickEvents::EntityId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ClickEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 复合索引（单 banner 时间范围查询 + COUNT）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_entity_time")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::EntityId)
                    .col(ClickEvents::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_click_events_entity_time")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ClickEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ClickEvents {
    #[sea_orm(iden = "click_events")]
    Table,
    Id,
    EntityId,
    OccurredAt,
}
