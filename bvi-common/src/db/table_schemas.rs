//! Declared table layouts for column auto-sync
//!
//! Must list the same columns as the `CREATE TABLE` statements in `init`.
//! New columns go here and in the create statement; existing databases pick
//! them up on the next startup.

use crate::db::schema_sync::{ColumnDefinition, SchemaSync, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

pub struct FilingsTableSchema;

impl TableSchema for FilingsTableSchema {
    fn table_name() -> &'static str {
        "filings"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("ttb_id", "TEXT").primary_key(),
            ColumnDefinition::new("filer_name", "TEXT").not_null().default("''"),
            ColumnDefinition::new("brand_name", "TEXT").not_null().default("''"),
            ColumnDefinition::new("variant_name", "TEXT").not_null().default("''"),
            ColumnDefinition::new("category_code", "TEXT").not_null().default("''"),
            ColumnDefinition::new("approval_date", "TEXT").not_null(),
            ColumnDefinition::new("status", "TEXT").not_null(),
            ColumnDefinition::new("company_id", "TEXT"),
            ColumnDefinition::new("signal", "TEXT"),
            ColumnDefinition::new("refile_count", "INTEGER"),
            ColumnDefinition::new("classified_at", "TIMESTAMP"),
            ColumnDefinition::new("ingested_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }
}

pub struct CompaniesTableSchema;

impl TableSchema for CompaniesTableSchema {
    fn table_name() -> &'static str {
        "companies"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("company_id", "TEXT").primary_key(),
            ColumnDefinition::new("display_name", "TEXT").not_null(),
            ColumnDefinition::new("normalized_name", "TEXT").not_null(),
            ColumnDefinition::new("created_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }
}

pub struct CompanyDbasTableSchema;

impl TableSchema for CompanyDbasTableSchema {
    fn table_name() -> &'static str {
        "company_dbas"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("company_id", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("dba_name", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("created_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }
}

pub struct CompanyAliasesTableSchema;

impl TableSchema for CompanyAliasesTableSchema {
    fn table_name() -> &'static str {
        "company_aliases"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("raw_name", "TEXT").primary_key(),
            ColumnDefinition::new("normalized_name", "TEXT").not_null(),
            ColumnDefinition::new("company_id", "TEXT").not_null(),
            ColumnDefinition::new("created_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }
}

pub struct ObservedCompaniesTableSchema;

impl TableSchema for ObservedCompaniesTableSchema {
    fn table_name() -> &'static str {
        "observed_companies"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("company_id", "TEXT").primary_key(),
            ColumnDefinition::new("first_seen", "TEXT").not_null(),
        ]
    }
}

pub struct ObservedBrandsTableSchema;

impl TableSchema for ObservedBrandsTableSchema {
    fn table_name() -> &'static str {
        "observed_brands"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("company_id", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("brand", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("first_seen", "TEXT").not_null(),
        ]
    }
}

pub struct ObservedProductsTableSchema;

impl TableSchema for ObservedProductsTableSchema {
    fn table_name() -> &'static str {
        "observed_products"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("company_id", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("brand", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("variant", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("first_seen", "TEXT").not_null(),
        ]
    }
}

/// Add missing columns to every table
///
/// Runs after `CREATE TABLE IF NOT EXISTS`, before migrations.
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    let mut added = Vec::new();
    added.extend(SchemaSync::sync_table::<FilingsTableSchema>(pool).await?);
    added.extend(SchemaSync::sync_table::<CompaniesTableSchema>(pool).await?);
    added.extend(SchemaSync::sync_table::<CompanyDbasTableSchema>(pool).await?);
    added.extend(SchemaSync::sync_table::<CompanyAliasesTableSchema>(pool).await?);
    added.extend(SchemaSync::sync_table::<ObservedCompaniesTableSchema>(pool).await?);
    added.extend(SchemaSync::sync_table::<ObservedBrandsTableSchema>(pool).await?);
    added.extend(SchemaSync::sync_table::<ObservedProductsTableSchema>(pool).await?);

    if !added.is_empty() {
        info!("Schema sync added {} column(s)", added.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema_sync::{SchemaDiff, SchemaIntrospector};
    use crate::db::init_memory_database;

    async fn assert_in_sync<T: TableSchema>(pool: &SqlitePool) {
        let actual = SchemaIntrospector::introspect_table(pool, T::table_name())
            .await
            .unwrap();
        let drift = SchemaDiff::compare(T::table_name(), &T::expected_columns(), &actual);
        assert!(drift.is_empty(), "{} drifted: {:?}", T::table_name(), drift);
        assert_eq!(actual.len(), T::expected_columns().len(), "{}", T::table_name());
    }

    #[tokio::test]
    async fn test_declarations_match_created_tables() {
        let pool = init_memory_database().await.unwrap();

        assert_in_sync::<FilingsTableSchema>(&pool).await;
        assert_in_sync::<CompaniesTableSchema>(&pool).await;
        assert_in_sync::<CompanyDbasTableSchema>(&pool).await;
        assert_in_sync::<CompanyAliasesTableSchema>(&pool).await;
        assert_in_sync::<ObservedCompaniesTableSchema>(&pool).await;
        assert_in_sync::<ObservedBrandsTableSchema>(&pool).await;
        assert_in_sync::<ObservedProductsTableSchema>(&pool).await;
    }
}
