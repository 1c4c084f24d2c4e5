//! 累计点击数表迁移
//!
//! click_totals 为每个 banner 保存一行计数器，由 increment_total 原子更新。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClickTotals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickTotals::EntityId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClickTotals::Total)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ClickTotals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ClickTotals {
    #[sea_orm(iden = "click_totals")]
    Table,
    EntityId,
    Total,
}
