//! Warehouse SQL statement templates
//!
//! Identifiers are uppercased and double-quoted, so `sales_db` and `SALES_DB`
//! resolve to the same object and no identifier can break out of its quotes.
//! Tag values are single-quoted with `'` and `\` escaped. The tag object lives
//! in the same database and schema as the columns it is applied to.

/// Uppercase and double-quote one identifier
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.trim().to_uppercase().replace('"', "\"\""))
}

/// Single-quote a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// `"DB"."SCHEMA"."TAG"`
pub fn tag_object(database: &str, schema: &str, tag: &str) -> String {
    format!("{}.{}.{}", quote_ident(database), quote_ident(schema), quote_ident(tag))
}

pub fn create_tag(database: &str, schema: &str, tag: &str) -> String {
    format!("CREATE TAG IF NOT EXISTS {}", tag_object(database, schema, tag))
}

pub fn add_allowed_value(database: &str, schema: &str, tag: &str, value: &str) -> String {
    format!(
        "ALTER TAG {} ADD ALLOWED_VALUES {}",
        tag_object(database, schema, tag),
        quote_literal(value)
    )
}

pub fn set_column_tag(
    database: &str,
    schema: &str,
    table: &str,
    column: &str,
    tag: &str,
    value: &str,
) -> String {
    format!(
        "ALTER TABLE {}.{}.{} MODIFY COLUMN {} SET TAG {} = {}",
        quote_ident(database),
        quote_ident(schema),
        quote_ident(table),
        quote_ident(column),
        tag_object(database, schema, tag),
        quote_literal(value)
    )
}

pub fn unset_column_tag(database: &str, schema: &str, table: &str, column: &str, tag: &str) -> String {
    format!(
        "ALTER TABLE {}.{}.{} MODIFY COLUMN {} UNSET TAG {}",
        quote_ident(database),
        quote_ident(schema),
        quote_ident(table),
        quote_ident(column),
        tag_object(database, schema, tag)
    )
}

/// Base tables of one database, as `(TABLE_SCHEMA, TABLE_NAME)` rows
pub fn list_tables(database: &str) -> String {
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME FROM {}.INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA <> 'INFORMATION_SCHEMA' \
         ORDER BY TABLE_SCHEMA, TABLE_NAME",
        quote_ident(database)
    )
}

/// Column-level references of `tag` in the given databases
///
/// Rows: `(OBJECT_DATABASE, OBJECT_SCHEMA, OBJECT_NAME, COLUMN_NAME, TAG_VALUE)`.
pub fn tag_references(databases: &[String], tag: &str) -> String {
    let in_list = databases
        .iter()
        .map(|db| quote_literal(&db.to_uppercase()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "SELECT OBJECT_DATABASE, OBJECT_SCHEMA, OBJECT_NAME, COLUMN_NAME, TAG_VALUE \
         FROM SNOWFLAKE.ACCOUNT_USAGE.TAG_REFERENCES \
         WHERE DOMAIN = 'COLUMN' AND OBJECT_DELETED IS NULL \
         AND TAG_NAME = {} AND OBJECT_DATABASE IN ({}) \
         ORDER BY OBJECT_DATABASE, OBJECT_SCHEMA, OBJECT_NAME, COLUMN_NAME",
        quote_literal(&tag.to_uppercase()),
        in_list
    )
}
