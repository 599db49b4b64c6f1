use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Formatted and raw Postgres type metadata for a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnType {
    /// User-friendly formatted type (e.g. `character varying(255)`).
    pub data_type: String,
    /// Namespace of the underlying type.
    pub udt_schema: String,
    /// Name of the underlying type (e.g. `int4`, `varchar`, or an enum name).
    pub udt_name: String,
    pub character_max_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
}

impl ColumnType {
    /// Build a type with no length/precision modifiers.
    pub fn simple(data_type: &str) -> Self {
        Self {
            data_type: data_type.to_string(),
            udt_schema: "pg_catalog".to_string(),
            udt_name: data_type.to_string(),
            character_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    /// Declared type without modifiers, lowercased (`numeric(10,2)` -> `numeric`,
    /// `timestamp(3) with time zone` -> `timestamp with time zone`).
    pub fn base_name(&self) -> String {
        let mut name = String::with_capacity(self.data_type.len());
        let mut depth = 0_usize;
        for ch in self.data_type.chars() {
            match ch {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ if depth == 0 => name.push(ch),
                _ => {}
            }
        }
        name.trim_end_matches("[]")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Returns true for array types such as `text[]`.
    pub fn is_array(&self) -> bool {
        self.data_type.ends_with("[]") || self.udt_name.starts_with('_')
    }

    /// Classify the declared type into the family used for value generation.
    pub fn family(&self) -> TypeFamily {
        if self.is_array() {
            return TypeFamily::Other;
        }

        match self.base_name().as_str() {
            "smallint" | "int2" | "smallserial" => TypeFamily::Integer(IntWidth::Small),
            "integer" | "int" | "int4" | "serial" => TypeFamily::Integer(IntWidth::Regular),
            "bigint" | "int8" | "bigserial" => TypeFamily::Integer(IntWidth::Big),
            "numeric" | "decimal" => TypeFamily::Numeric,
            "money" => TypeFamily::Money,
            "real" | "float4" | "double precision" | "float8" => TypeFamily::Float,
            "boolean" | "bool" => TypeFamily::Boolean,
            "uuid" => TypeFamily::Uuid,
            "date" => TypeFamily::Date,
            "time without time zone" | "time with time zone" | "time" | "timetz" => {
                TypeFamily::Time
            }
            "timestamp without time zone" | "timestamp" => TypeFamily::Timestamp,
            "timestamp with time zone" | "timestamptz" => TypeFamily::TimestampTz,
            "json" | "jsonb" => TypeFamily::Json,
            "interval" => TypeFamily::Interval,
            "character varying" | "varchar" | "character" | "char" | "bpchar" | "text"
            | "citext" | "name" => TypeFamily::Character,
            _ => TypeFamily::Other,
        }
    }
}

/// Storage width of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    Small,
    Regular,
    Big,
}

impl IntWidth {
    /// Largest value representable by the width.
    pub fn max_value(self) -> i64 {
        match self {
            IntWidth::Small => i16::MAX as i64,
            IntWidth::Regular => i32::MAX as i64,
            IntWidth::Big => i64::MAX,
        }
    }
}

/// Type families the generators dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Integer(IntWidth),
    Numeric,
    Money,
    Float,
    Boolean,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Json,
    Interval,
    Character,
    Other,
}

/// Identity generation strategy for columns using `GENERATED ... AS IDENTITY`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentityGeneration {
    Always,
    ByDefault,
}

/// Information about stored generated column expressions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct GeneratedExpression {
    pub expression: Option<String>,
}

/// Representation of Postgres enum types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct EnumType {
    pub schema: String,
    pub name: String,
    pub labels: Vec<String>,
}
