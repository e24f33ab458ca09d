use sea_orm_migration::prelude::*;
use service::DB_SCHEMA;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create the service's schema
        manager
            .get_connection()
            .execute_unprepared(&format!("CREATE SCHEMA IF NOT EXISTS {DB_SCHEMA};"))
            .await?;

        manager
            .get_connection()
            .execute_unprepared(&format!("SET search_path TO {DB_SCHEMA}, public;"))
            .await?;

        // Let the database owner that runs the service queries use everything in the schema
        manager
            .get_connection()
            .execute_unprepared(&format!(
                r#"
                DO $$ BEGIN
                    GRANT ALL ON SCHEMA {DB_SCHEMA} TO CURRENT_USER;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA {DB_SCHEMA} GRANT ALL ON TABLES TO CURRENT_USER;
                END $$;
            "#
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop the schema (CASCADE will remove all objects in it)
        manager
            .get_connection()
            .execute_unprepared(&format!("DROP SCHEMA IF EXISTS {DB_SCHEMA} CASCADE;"))
            .await?;

        Ok(())
    }
}
