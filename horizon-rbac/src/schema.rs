//! Arrow schema definitions for the portal Delta tables
//!
//! Each table has:
//! - An Arrow `Schema` for RecordBatch construction
//! - A list of Delta `StructField`s for table creation
//! - Partition columns (none; both tables are small)

use deltalake::arrow::datatypes::{DataType, Field, Schema};
use deltalake::kernel::{DataType as DeltaDataType, PrimitiveType, StructField};

// ─── Table Names (constants) ───

pub const TABLE_IDENTITIES: &str = "identities";
/// Profile mirror; the name matches the document collection it replaces
pub const TABLE_USERS: &str = "users";

// ─── Identities Table ───

/// Arrow schema for the `identities` Delta table
pub fn identities_arrow_schema() -> Schema {
    Schema::new(vec![
        Field::new("uid", DataType::Utf8, false),
        Field::new("email", DataType::Utf8, false),
        Field::new("password_hash", DataType::Utf8, false),
        Field::new("display_name", DataType::Utf8, false),
        Field::new("role_claim", DataType::Utf8, true),
        Field::new("created_at", DataType::Utf8, false),
    ])
}

/// Delta StructFields for `identities` table creation
pub fn identities_delta_fields() -> Vec<StructField> {
    vec![
        StructField::new("uid", DeltaDataType::Primitive(PrimitiveType::String), false),
        StructField::new("email", DeltaDataType::Primitive(PrimitiveType::String), false),
        StructField::new("password_hash", DeltaDataType::Primitive(PrimitiveType::String), false),
        StructField::new("display_name", DeltaDataType::Primitive(PrimitiveType::String), false),
        StructField::new("role_claim", DeltaDataType::Primitive(PrimitiveType::String), true),
        StructField::new("created_at", DeltaDataType::Primitive(PrimitiveType::String), false),
    ]
}

// ─── Users (profile) Table ───

/// Arrow schema for the `users` Delta table
pub fn users_arrow_schema() -> Schema {
    Schema::new(vec![
        Field::new("uid", DataType::Utf8, false),
        Field::new("email", DataType::Utf8, false),
        Field::new("display_name", DataType::Utf8, false),
        Field::new("role", DataType::Utf8, false),
    ])
}

/// Delta StructFields for `users` table creation
pub fn users_delta_fields() -> Vec<StructField> {
    vec![
        StructField::new("uid", DeltaDataType::Primitive(PrimitiveType::String), false),
        StructField::new("email", DeltaDataType::Primitive(PrimitiveType::String), false),
        StructField::new("display_name", DeltaDataType::Primitive(PrimitiveType::String), false),
        StructField::new("role", DeltaDataType::Primitive(PrimitiveType::String), false),
    ]
}

// ─── Table Registry ───

/// Table definition for initialization
pub struct TableDef {
    pub name: &'static str,
    pub delta_fields: Vec<StructField>,
    pub partition_columns: Vec<String>,
}

/// All portal tables
pub fn all_tables() -> Vec<TableDef> {
    vec![
        TableDef {
            name: TABLE_IDENTITIES,
            delta_fields: identities_delta_fields(),
            partition_columns: vec![],
        },
        TableDef {
            name: TABLE_USERS,
            delta_fields: users_delta_fields(),
            partition_columns: vec![],
        },
    ]
}

/// Quote a value for use inside a SQL string literal
pub fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
