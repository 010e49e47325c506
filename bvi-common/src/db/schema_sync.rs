//! Column auto-sync
//!
//! Table layouts are declared in code (`table_schemas`). On startup every
//! table is introspected with `PRAGMA table_info` and columns the declaration
//! has but the database lacks are added with `ALTER TABLE ADD COLUMN`.
//!
//! Runs after `CREATE TABLE IF NOT EXISTS` and before versioned migrations.
//! Only additions are automatic; type or constraint drift is logged and left
//! for a migration.

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// Declared column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    /// SQL type (`TEXT`, `INTEGER`, `REAL`, `TIMESTAMP`)
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// SQL default expression, e.g. `"''"` or `"CURRENT_TIMESTAMP"`
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// SQLite refuses `ADD COLUMN` with a non-constant default
    fn has_time_default(&self) -> bool {
        matches!(
            self.default_value.as_deref().map(str::to_ascii_uppercase).as_deref(),
            Some("CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME")
        )
    }
}

/// Column as reported by `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub pk: bool,
}

/// Difference between a declaration and the database
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    ConstraintMismatch {
        table: String,
        column: String,
        constraint: String,
    },
}

/// Declared layout of one table
pub trait TableSchema {
    fn table_name() -> &'static str;

    fn expected_columns() -> Vec<ColumnDefinition>;
}

pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Columns in declaration order (by cid)
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", table_name))
            .fetch_all(pool)
            .await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();
        columns.sort_by_key(|c| c.cid);

        Ok(columns)
    }

    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)",
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

pub struct SchemaDiff;

impl SchemaDiff {
    pub fn compare(
        table_name: &str,
        expected: &[ColumnDefinition],
        actual: &[ActualColumn],
    ) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in expected {
            let Some(actual_col) = actual.iter().find(|c| c.name == expected_col.name) else {
                drift.push(SchemaDrift::MissingColumn {
                    table: table_name.to_string(),
                    column: expected_col.clone(),
                });
                continue;
            };

            if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                drift.push(SchemaDrift::TypeMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    expected: expected_col.sql_type.clone(),
                    actual: actual_col.type_name.clone(),
                });
            }

            // SQLite reports non-INTEGER primary keys as nullable
            if expected_col.not_null && !actual_col.not_null && !actual_col.pk {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    constraint: "NOT NULL".to_string(),
                });
            }

            if expected_col.primary_key && !actual_col.pk {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    constraint: "PRIMARY KEY".to_string(),
                });
            }
        }

        drift
    }

    /// SQLite type affinity comparison
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = expected.to_uppercase();
        let act = actual.to_uppercase();

        if exp == act {
            return true;
        }

        let integer = |t: &str| t.contains("INT");
        let text = |t: &str| t.contains("TEXT") || t.contains("CHAR") || t.contains("CLOB");
        let real = |t: &str| t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB");

        (integer(&exp) && integer(&act)) || (text(&exp) && text(&act)) || (real(&exp) && real(&act))
    }
}

pub struct SchemaSync;

impl SchemaSync {
    /// Add missing columns to one table; returns the names added
    pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<Vec<String>> {
        let table_name = T::table_name();

        if !SchemaIntrospector::table_exists(pool, table_name).await? {
            warn!("Schema sync: table '{}' does not exist", table_name);
            return Ok(Vec::new());
        }

        let actual = SchemaIntrospector::introspect_table(pool, table_name).await?;
        let drift = SchemaDiff::compare(table_name, &T::expected_columns(), &actual);

        if drift.is_empty() {
            debug!("Schema sync: '{}' up to date", table_name);
            return Ok(Vec::new());
        }

        let mut added = Vec::new();
        for change in drift {
            match change {
                SchemaDrift::MissingColumn { table, column } => {
                    Self::add_column(pool, &table, &column).await?;
                    added.push(column.name);
                }
                SchemaDrift::TypeMismatch {
                    table,
                    column,
                    expected,
                    actual,
                } => {
                    warn!(
                        "Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                        table, column, expected, actual
                    );
                }
                SchemaDrift::ConstraintMismatch {
                    table,
                    column,
                    constraint,
                } => {
                    warn!(
                        "Constraint mismatch in {}.{}: missing '{}'. Manual migration required.",
                        table, column, constraint
                    );
                }
            }
        }

        Ok(added)
    }

    async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, column.name, column.sql_type
        );

        if column.primary_key {
            warn!(
                "Cannot add PRIMARY KEY column {}.{} via ALTER TABLE; added without the constraint",
                table, column.name
            );
        }

        // Time defaults are backfilled after the column exists
        let backfill = column.has_time_default();
        match (&column.default_value, backfill) {
            (Some(_), true) => {}
            (Some(default), false) if column.not_null => {
                sql.push_str(&format!(" NOT NULL DEFAULT {}", default));
            }
            (Some(default), false) => {
                sql.push_str(&format!(" DEFAULT {}", default));
            }
            (None, _) if column.not_null => {
                warn!(
                    "Cannot add NOT NULL column {}.{} without a constant DEFAULT; column will be nullable",
                    table, column.name
                );
            }
            _ => {}
        }

        info!("Adding column: {}.{} ({})", table, column.name, column.sql_type);

        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                info!("Column {}.{} already added", table, column.name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        if let (true, Some(default)) = (backfill, &column.default_value) {
            sqlx::query(&format!(
                "UPDATE {} SET {} = {} WHERE {} IS NULL",
                table, column.name, default, column.name
            ))
            .execute(pool)
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    struct MarksSchema;

    impl TableSchema for MarksSchema {
        fn table_name() -> &'static str {
            "marks"
        }

        fn expected_columns() -> Vec<ColumnDefinition> {
            vec![
                ColumnDefinition::new("id", "TEXT").primary_key(),
                ColumnDefinition::new("label", "TEXT").not_null().default("''"),
                ColumnDefinition::new("weight", "INTEGER"),
                ColumnDefinition::new("seen_at", "TIMESTAMP")
                    .not_null()
                    .default("CURRENT_TIMESTAMP"),
            ]
        }
    }

    #[test]
    fn test_types_compatible() {
        assert!(SchemaDiff::types_compatible("TEXT", "text"));
        assert!(SchemaDiff::types_compatible("INTEGER", "BIGINT"));
        assert!(SchemaDiff::types_compatible("TEXT", "VARCHAR(20)"));
        assert!(SchemaDiff::types_compatible("REAL", "DOUBLE"));
        assert!(!SchemaDiff::types_compatible("INTEGER", "TEXT"));
    }

    #[test]
    fn test_compare_reports_missing_and_mismatched() {
        let actual = vec![
            ActualColumn {
                cid: 0,
                name: "id".to_string(),
                type_name: "TEXT".to_string(),
                not_null: false,
                pk: true,
            },
            ActualColumn {
                cid: 1,
                name: "weight".to_string(),
                type_name: "TEXT".to_string(),
                not_null: false,
                pk: false,
            },
        ];

        let drift = SchemaDiff::compare("marks", &MarksSchema::expected_columns(), &actual);

        let missing: Vec<&str> = drift
            .iter()
            .filter_map(|d| match d {
                SchemaDrift::MissingColumn { column, .. } => Some(column.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(missing, vec!["label", "seen_at"]);
        assert!(drift.iter().any(|d| matches!(
            d,
            SchemaDrift::TypeMismatch { column, .. } if column == "weight"
        )));
    }

    #[tokio::test]
    async fn test_sync_adds_missing_columns_and_keeps_rows() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE marks (id TEXT PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO marks (id) VALUES ('a')")
            .execute(&pool)
            .await
            .unwrap();

        let added = SchemaSync::sync_table::<MarksSchema>(&pool).await.unwrap();
        assert_eq!(added, vec!["label", "weight", "seen_at"]);

        let row = sqlx::query("SELECT label, weight FROM marks WHERE id = 'a'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("label"), "");
        assert_eq!(row.get::<Option<i64>, _>("weight"), None);

        let stamped: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM marks WHERE seen_at IS NOT NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stamped, 1);

        let again = SchemaSync::sync_table::<MarksSchema>(&pool).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_sync_skips_missing_table() {
        let pool = setup_test_db().await;
        let added = SchemaSync::sync_table::<MarksSchema>(&pool).await.unwrap();
        assert!(added.is_empty());
    }
}
