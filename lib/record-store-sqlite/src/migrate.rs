//! Table creation and the destructive version policy.
//!
//! The bookkeeping table `record_store_schema` maps each managed table to the
//! schema version it was created with. A missing entry creates the table; a
//! different version drops it and creates it again, discarding every row.
//! There is no additive migration.

use record_store::{FieldKind, FieldSpec, ID_COLUMN, SchemaStatus, StoreError, TableSchema, Value};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

use crate::bind::{quote_ident, quote_literal};

/// Name of the bookkeeping table.
pub const SCHEMA_TABLE: &str = "record_store_schema";

fn column_sql(field: &FieldSpec) -> String {
    let kind = match field.kind {
        FieldKind::Text => "TEXT",
        FieldKind::Integer => "INTEGER",
    };
    let mut sql = format!("{} {}", quote_ident(&field.name), kind);
    if field.not_null() {
        sql.push_str(" NOT NULL");
    }
    match &field.default {
        Some(Value::Int(n)) => sql.push_str(&format!(" DEFAULT {}", n)),
        Some(Value::Float(f)) => sql.push_str(&format!(" DEFAULT {}", f)),
        Some(Value::Bool(b)) => sql.push_str(&format!(" DEFAULT {}", i64::from(*b))),
        Some(Value::String(s)) => sql.push_str(&format!(" DEFAULT {}", quote_literal(s))),
        Some(Value::Null) | None => {}
    }
    sql
}

/// CREATE TABLE statement for `schema`.
pub fn create_table_sql(schema: &TableSchema) -> String {
    let mut columns = vec![format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(ID_COLUMN)
    )];
    columns.extend(schema.fields.iter().map(column_sql));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        quote_ident(&schema.table),
        columns.join(", ")
    )
}

/// Create the table if absent; drop and recreate it on a version mismatch.
pub(crate) fn ensure_table(
    connection: &mut Connection,
    schema: &TableSchema,
) -> Result<SchemaStatus, StoreError> {
    if schema.table == SCHEMA_TABLE || schema.table.starts_with("sqlite_") {
        return Err(StoreError::InvalidSchema(format!(
            "table name '{}' is reserved",
            schema.table
        )));
    }

    let tx = connection.transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (table_name TEXT PRIMARY KEY, version INTEGER NOT NULL);",
        SCHEMA_TABLE
    ))?;
    let stored: Option<i64> = tx
        .query_row(
            &format!("SELECT version FROM {} WHERE table_name = ?1", SCHEMA_TABLE),
            params![schema.table],
            |row| row.get(0),
        )
        .optional()?;

    let create_sql = create_table_sql(schema);
    let status = match stored {
        None => {
            tx.execute_batch(&create_sql)?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (table_name, version) VALUES (?1, ?2)",
                    SCHEMA_TABLE
                ),
                params![schema.table, schema.version],
            )?;
            info!(table = %schema.table, version = schema.version, "created table");
            SchemaStatus::Created
        }
        Some(version) if version == i64::from(schema.version) => {
            tx.execute_batch(&create_sql)?;
            SchemaStatus::Current
        }
        Some(version) => {
            warn!(
                table = %schema.table,
                from = version,
                to = schema.version,
                "schema version changed, dropping table and all of its rows"
            );
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(&schema.table)))?;
            tx.execute_batch(&create_sql)?;
            tx.execute(
                &format!(
                    "UPDATE {} SET version = ?2 WHERE table_name = ?1",
                    SCHEMA_TABLE
                ),
                params![schema.table, schema.version],
            )?;
            SchemaStatus::Recreated {
                previous: u32::try_from(version).unwrap_or_default(),
            }
        }
    };
    tx.commit()?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pets_table_layout() {
        assert_eq!(
            create_table_sql(&TableSchema::pets()),
            concat!(
                r#"CREATE TABLE IF NOT EXISTS "pets" ("#,
                r#""id" INTEGER PRIMARY KEY AUTOINCREMENT, "#,
                r#""name" TEXT NOT NULL, "#,
                r#""breed" TEXT NOT NULL, "#,
                r#""gender" INTEGER NOT NULL DEFAULT 0, "#,
                r#""weight" INTEGER NOT NULL DEFAULT 0);"#
            )
        );
    }

    #[test]
    fn optional_text_column_is_nullable() {
        let sql = create_table_sql(&TableSchema::stock());
        assert!(sql.contains(r#""image" TEXT,"#) || sql.ends_with(r#""image" TEXT);"#));
        assert!(sql.contains(r#""price" INTEGER NOT NULL DEFAULT 0"#));
    }

    #[test]
    fn reserved_table_names_are_rejected() {
        let mut connection = Connection::open_in_memory().unwrap();
        let mut schema = TableSchema::pets();
        schema.table = SCHEMA_TABLE.to_string();
        assert!(matches!(
            ensure_table(&mut connection, &schema),
            Err(StoreError::InvalidSchema(_))
        ));
    }

    #[test]
    fn version_bump_drops_rows() {
        let mut connection = Connection::open_in_memory().unwrap();
        let mut schema = TableSchema::pets();
        assert_eq!(
            ensure_table(&mut connection, &schema).unwrap(),
            SchemaStatus::Created
        );
        connection
            .execute(
                r#"INSERT INTO "pets" ("name", "breed") VALUES ('Rex', 'Labrador')"#,
                [],
            )
            .unwrap();
        assert_eq!(
            ensure_table(&mut connection, &schema).unwrap(),
            SchemaStatus::Current
        );

        schema.version = 2;
        assert_eq!(
            ensure_table(&mut connection, &schema).unwrap(),
            SchemaStatus::Recreated { previous: 1 }
        );
        let count: i64 = connection
            .query_row(r#"SELECT COUNT(*) FROM "pets""#, [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
