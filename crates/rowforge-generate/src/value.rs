use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Serialize, Serializer};

use rowforge_core::Column;

/// Generated value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact decimal rendered as text so precision survives binding.
    Numeric(String),
    Text(String),
    Uuid(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
    /// Postgres interval literal (e.g. `3 days 04:05:06`).
    Interval(String),
}

impl GeneratedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GeneratedValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GeneratedValue::Text(value)
            | GeneratedValue::Uuid(value)
            | GeneratedValue::Numeric(value)
            | GeneratedValue::Interval(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GeneratedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Text form bound into insert statements and cast to the declared type.
    /// `None` binds SQL `NULL`.
    pub fn to_sql_text(&self) -> Option<String> {
        match self {
            GeneratedValue::Null => None,
            GeneratedValue::Bool(value) => Some(value.to_string()),
            GeneratedValue::Int(value) => Some(value.to_string()),
            GeneratedValue::Float(value) => Some(value.to_string()),
            GeneratedValue::Numeric(value)
            | GeneratedValue::Text(value)
            | GeneratedValue::Uuid(value)
            | GeneratedValue::Interval(value) => Some(value.clone()),
            GeneratedValue::Date(value) => Some(value.format("%Y-%m-%d").to_string()),
            GeneratedValue::Time(value) => Some(value.format("%H:%M:%S%.f").to_string()),
            GeneratedValue::Timestamp(value) => {
                Some(value.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            GeneratedValue::TimestampTz(value) => Some(value.to_rfc3339()),
            GeneratedValue::Json(value) => Some(value.to_string()),
        }
    }

    /// Truncate text values to the column's declared maximum length, counted in
    /// characters.
    pub fn truncated_for(self, column: &Column) -> Self {
        let Some(max) = column.column_type.character_max_length else {
            return self;
        };
        match self {
            GeneratedValue::Text(text) => GeneratedValue::Text(truncate_chars(text, max)),
            other => other,
        }
    }
}

impl Serialize for GeneratedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GeneratedValue::Null => serializer.serialize_none(),
            GeneratedValue::Bool(value) => serializer.serialize_bool(*value),
            GeneratedValue::Int(value) => serializer.serialize_i64(*value),
            GeneratedValue::Float(value) => serializer.serialize_f64(*value),
            GeneratedValue::Json(value) => value.serialize(serializer),
            other => match other.to_sql_text() {
                Some(text) => serializer.serialize_str(&text),
                None => serializer.serialize_none(),
            },
        }
    }
}

pub fn truncate_chars(text: String, max: i32) -> String {
    let max = usize::try_from(max).unwrap_or(0);
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowforge_core::ColumnType;

    #[test]
    fn truncates_by_characters_not_bytes() {
        assert_eq!(truncate_chars("ação rápida".to_string(), 4), "ação");
        assert_eq!(truncate_chars("abc".to_string(), 10), "abc");
        assert_eq!(truncate_chars("abc".to_string(), 0), "");
    }

    #[test]
    fn only_text_is_truncated_for_column() {
        let column = Column {
            ordinal_position: 1,
            name: "code".to_string(),
            column_type: ColumnType {
                character_max_length: Some(3),
                ..ColumnType::simple("character varying(3)")
            },
            is_nullable: false,
            default: None,
            identity: None,
            generated: None,
        };
        assert_eq!(
            GeneratedValue::Text("abcdef".to_string()).truncated_for(&column),
            GeneratedValue::Text("abc".to_string())
        );
        assert_eq!(
            GeneratedValue::Int(123456).truncated_for(&column),
            GeneratedValue::Int(123456)
        );
    }

    #[test]
    fn null_binds_as_sql_null() {
        assert_eq!(GeneratedValue::Null.to_sql_text(), None);
        assert_eq!(
            GeneratedValue::Json(serde_json::json!({})).to_sql_text(),
            Some("{}".to_string())
        );
    }
}
