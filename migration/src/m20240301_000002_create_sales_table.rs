use sea_orm_migration::prelude::*;
use service::DB_SCHEMA;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table((Alias::new(DB_SCHEMA), Sales::Table))
                    .if_not_exists()
                    .col(ColumnDef::new(Sales::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sales::Date).date().not_null())
                    .col(ColumnDef::new(Sales::Actualsales).double().not_null())
                    .col(ColumnDef::new(Sales::Product).string())
                    .col(ColumnDef::new(Sales::Region).string())
                    .col(
                        ColumnDef::new(Sales::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("sales_date")
                    .table((Alias::new(DB_SCHEMA), Sales::Table))
                    .col(Sales::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table((Alias::new(DB_SCHEMA), Sales::Table))
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Sales {
    Table,
    Id,
    Date,
    Actualsales,
    Product,
    Region,
    CreatedAt,
}
