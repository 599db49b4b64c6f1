//! Type-aware default value generators.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

use rowforge_core::{Column, IntWidth, TableKey, TypeFamily};

use crate::errors::GenerationError;
use crate::value::{GeneratedValue, truncate_chars};

pub mod interval;
pub mod matcher;
pub mod named;

pub use matcher::{GeneratorMatcher, KeywordMatcher};
pub use named::NamedGenerator;

const UNCONSTRAINED_NUMERIC: (u32, u32) = (10, 2);
const MONEY_NUMERIC: (u32, u32) = (12, 2);
const FLOAT_MAX: f64 = 1_000_000.0;
const HISTORY_YEARS: i64 = 30;
const UNIQUE_ATTEMPTS: usize = 16;
const SHORT_TEXT_MAX: i32 = 64;

/// Column being generated, with the catalog facts the generators need.
#[derive(Debug, Clone, Copy)]
pub struct ColumnContext<'a> {
    pub table: &'a TableKey,
    pub column: &'a Column,
    pub enum_labels: Option<&'a [String]>,
    pub unique: bool,
}

/// Default generators plus the per-column named-generator cache.
pub struct ValueGenerators {
    matcher: Box<dyn GeneratorMatcher>,
    selected: HashMap<(TableKey, String), NamedGenerator>,
    seen: HashMap<(TableKey, String), HashSet<String>>,
    now: DateTime<Utc>,
}

impl Default for ValueGenerators {
    fn default() -> Self {
        Self::new(Box::new(KeywordMatcher::default()))
    }
}

impl ValueGenerators {
    pub fn new(matcher: Box<dyn GeneratorMatcher>) -> Self {
        Self {
            matcher,
            selected: HashMap::new(),
            seen: HashMap::new(),
            now: Utc::now(),
        }
    }

    /// Pin "now" for the date family, mostly for tests.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Named generator for a column; chosen once and reused for every row.
    pub fn generator_for(&mut self, table: &TableKey, column: &Column) -> NamedGenerator {
        let key = (table.clone(), column.name.clone());
        if let Some(named) = self.selected.get(&key) {
            return *named;
        }

        let context = format!("{} {}", table.table, column.name);
        let named = self
            .matcher
            .match_generator(&context)
            .unwrap_or_else(|| default_text_generator(column));
        tracing::debug!(
            table = %table,
            column = %column.name,
            generator = named.id(),
            "selected named generator"
        );
        self.selected.insert(key, named);
        named
    }

    /// Generate a value dispatching on the declared column type. Unique columns
    /// never repeat a value already produced for the same (table, column).
    pub fn generate(
        &mut self,
        ctx: ColumnContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let family = ctx.column.column_type.family();
        if ctx.enum_labels.is_none() && family == TypeFamily::Character {
            return Ok(self.generate_text(ctx, rng));
        }
        if !ctx.unique {
            return self.draw(ctx, family, rng);
        }

        let key = (ctx.table.clone(), ctx.column.name.clone());
        let mut last = None;
        for _ in 0..UNIQUE_ATTEMPTS {
            let candidate = self.draw(ctx, family, &mut *rng)?;
            let seen = self.seen.entry(key.clone()).or_default();
            if seen.insert(candidate.to_sql_text().unwrap_or_default()) {
                return Ok(candidate);
            }
            last = Some(candidate);
        }

        let seen = self.seen.entry(key).or_default();
        if let TypeFamily::Integer(width) = family
            && ctx.enum_labels.is_none()
        {
            let start = last.as_ref().and_then(GeneratedValue::as_i64).unwrap_or(0);
            let max = integer_bound(width, ctx.column.column_type.numeric_precision);
            return match next_unused_integer(seen, start, max) {
                Some(value) => {
                    seen.insert(value.to_string());
                    Ok(GeneratedValue::Int(value))
                }
                None => Err(GenerationError::UniqueExhausted(ctx.column.name.clone())),
            };
        }

        tracing::warn!(
            table = %ctx.table,
            column = %ctx.column.name,
            "no unused value after retries; keeping a repeated value"
        );
        last.ok_or_else(|| GenerationError::UniqueExhausted(ctx.column.name.clone()))
    }

    fn draw(
        &self,
        ctx: ColumnContext<'_>,
        family: TypeFamily,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        if let Some(labels) = ctx.enum_labels {
            return labels
                .choose(rng)
                .map(|label| GeneratedValue::Text(label.clone()))
                .ok_or_else(|| {
                    GenerationError::MissingEnumLabels(ctx.column.column_type.udt_name.clone())
                });
        }

        let column_type = &ctx.column.column_type;
        let value = match family {
            TypeFamily::Integer(width) => {
                GeneratedValue::Int(random_integer(width, column_type.numeric_precision, rng))
            }
            TypeFamily::Numeric => {
                let (precision, scale) = match column_type.numeric_precision {
                    Some(precision) if precision > 0 => (
                        precision as u32,
                        column_type.numeric_scale.unwrap_or(0).max(0) as u32,
                    ),
                    _ => UNCONSTRAINED_NUMERIC,
                };
                GeneratedValue::Numeric(random_numeric(precision, scale, rng))
            }
            TypeFamily::Money => {
                let (precision, scale) = MONEY_NUMERIC;
                GeneratedValue::Numeric(random_numeric(precision, scale, rng))
            }
            TypeFamily::Float => GeneratedValue::Float(rng.random_range(0.0..FLOAT_MAX)),
            TypeFamily::Boolean => GeneratedValue::Bool(rng.random_bool(0.5)),
            TypeFamily::Uuid => GeneratedValue::Uuid(random_uuid(rng)),
            TypeFamily::Date => GeneratedValue::Date(self.random_instant(rng).date_naive()),
            TypeFamily::Time => GeneratedValue::Time(self.random_instant(rng).time()),
            TypeFamily::Timestamp => {
                GeneratedValue::Timestamp(self.random_instant(rng).naive_utc())
            }
            TypeFamily::TimestampTz => GeneratedValue::TimestampTz(self.random_instant(rng)),
            TypeFamily::Json => GeneratedValue::Json(serde_json::json!({})),
            TypeFamily::Interval => GeneratedValue::Interval(interval::random_interval(rng)),
            TypeFamily::Other if column_type.is_array() => GeneratedValue::Text("{}".to_string()),
            TypeFamily::Character | TypeFamily::Other => {
                let word = NamedGenerator::Word.generate(rng);
                GeneratedValue::Text(word).truncated_for(ctx.column)
            }
        };
        Ok(value)
    }

    fn generate_text(&mut self, ctx: ColumnContext<'_>, rng: &mut dyn RngCore) -> GeneratedValue {
        let named = self.generator_for(ctx.table, ctx.column);
        let max = ctx.column.column_type.character_max_length;
        let produce = |rng: &mut dyn RngCore| -> String {
            let text = named.generate(rng);
            match max {
                Some(max) => truncate_chars(text, max),
                None => text,
            }
        };

        if !ctx.unique {
            return GeneratedValue::Text(produce(&mut *rng));
        }

        let seen = self
            .seen
            .entry((ctx.table.clone(), ctx.column.name.clone()))
            .or_default();
        for _ in 0..UNIQUE_ATTEMPTS {
            let candidate = produce(&mut *rng);
            if seen.insert(candidate.clone()) {
                return GeneratedValue::Text(candidate);
            }
        }

        tracing::warn!(
            table = %ctx.table,
            column = %ctx.column.name,
            generator = named.id(),
            "named generator exhausted unique values; using paragraph text"
        );
        let paragraph = NamedGenerator::Paragraph.generate(rng);
        let text = match max {
            Some(max) => truncate_chars(paragraph, max),
            None => paragraph,
        };
        seen.insert(text.clone());
        GeneratedValue::Text(text)
    }

    fn random_instant(&self, rng: &mut dyn RngCore) -> DateTime<Utc> {
        let span = Duration::days(HISTORY_YEARS * 365 + HISTORY_YEARS / 4).num_seconds();
        self.now - Duration::seconds(rng.random_range(0..=span))
    }
}

fn default_text_generator(column: &Column) -> NamedGenerator {
    match column.column_type.character_max_length {
        Some(max) if max <= SHORT_TEXT_MAX => NamedGenerator::Word,
        _ => NamedGenerator::Sentence,
    }
}

/// Largest generated value: `min(type_max, 10^precision - 1)`.
fn integer_bound(width: IntWidth, precision: Option<i32>) -> i64 {
    let type_max = width.max_value();
    precision
        .and_then(|p| u32::try_from(p).ok())
        .and_then(|p| 10_i64.checked_pow(p))
        .map(|bound| (bound - 1).min(type_max))
        .unwrap_or(type_max)
}

/// Uniform in `[0, min(type_max, 10^precision - 1)]`.
pub fn random_integer(width: IntWidth, precision: Option<i32>, rng: &mut dyn RngCore) -> i64 {
    rng.random_range(0..=integer_bound(width, precision))
}

/// First value in `[0, max]` not in `seen`, scanning up from `start` and wrapping.
fn next_unused_integer(seen: &HashSet<String>, start: i64, max: i64) -> Option<i64> {
    let start = start.clamp(0, max);
    (start..=max)
        .chain(0..start)
        .take(seen.len().saturating_add(1))
        .find(|value| !seen.contains(&value.to_string()))
}

/// Decimal text with an integer part below `10^(precision - scale)` and exactly
/// `scale` fractional digits.
pub fn random_numeric(precision: u32, scale: u32, rng: &mut dyn RngCore) -> String {
    let integer_digits = precision.saturating_sub(scale);
    let integer_part = random_digits(integer_digits, rng);
    if scale == 0 {
        return integer_part;
    }
    let mut fraction = String::with_capacity(scale as usize);
    for _ in 0..scale {
        fraction.push(char::from(b'0' + rng.random_range(0..10_u8)));
    }
    format!("{integer_part}.{fraction}")
}

/// Uniform integer in `[0, 10^digits - 1]` as text, without overflowing.
fn random_digits(digits: u32, rng: &mut dyn RngCore) -> String {
    if digits == 0 {
        return "0".to_string();
    }
    if let Some(bound) = 10_u64.checked_pow(digits) {
        return rng.random_range(0..bound).to_string();
    }
    let mut text = String::with_capacity(digits as usize);
    for _ in 0..digits {
        text.push(char::from(b'0' + rng.random_range(0..10_u8)));
    }
    let trimmed = text.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn random_uuid(rng: &mut dyn RngCore) -> String {
    let mut bytes = [0_u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

/// Value used when generation fails: null for nullable columns, otherwise the
/// smallest valid value of the column's type family.
pub fn fallback_value(column: &Column, enum_labels: Option<&[String]>) -> GeneratedValue {
    if column.is_nullable {
        return GeneratedValue::Null;
    }
    if let Some(first) = enum_labels.and_then(|labels| labels.first()) {
        return GeneratedValue::Text(first.clone());
    }
    match column.column_type.family() {
        TypeFamily::Integer(_) => GeneratedValue::Int(0),
        TypeFamily::Numeric | TypeFamily::Money => GeneratedValue::Numeric("0".to_string()),
        TypeFamily::Float => GeneratedValue::Float(0.0),
        TypeFamily::Boolean => GeneratedValue::Bool(false),
        TypeFamily::Uuid => GeneratedValue::Uuid(uuid::Uuid::nil().to_string()),
        TypeFamily::Date => GeneratedValue::Date(NaiveDate::default()),
        TypeFamily::Time => GeneratedValue::Time(NaiveTime::default()),
        TypeFamily::Timestamp => GeneratedValue::Timestamp(DateTime::<Utc>::UNIX_EPOCH.naive_utc()),
        TypeFamily::TimestampTz => GeneratedValue::TimestampTz(DateTime::<Utc>::UNIX_EPOCH),
        TypeFamily::Json => GeneratedValue::Json(serde_json::json!({})),
        TypeFamily::Interval => GeneratedValue::Interval(interval::format_interval(0)),
        TypeFamily::Other if column.column_type.is_array() => {
            GeneratedValue::Text("{}".to_string())
        }
        TypeFamily::Character | TypeFamily::Other => GeneratedValue::Text(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rowforge_core::ColumnType;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn column(data_type: &str) -> Column {
        Column {
            ordinal_position: 1,
            name: "value".to_string(),
            column_type: ColumnType::simple(data_type),
            is_nullable: false,
            default: None,
            identity: None,
            generated: None,
        }
    }

    fn numeric_column(precision: i32, scale: i32) -> Column {
        let mut column = column(&format!("numeric({precision},{scale})"));
        column.column_type.numeric_precision = Some(precision);
        column.column_type.numeric_scale = Some(scale);
        column
    }

    fn generate(
        generators: &mut ValueGenerators,
        column: &Column,
        rng: &mut ChaCha8Rng,
    ) -> GeneratedValue {
        let table = TableKey::new("public", "items");
        let ctx = ColumnContext {
            table: &table,
            column,
            enum_labels: None,
            unique: false,
        };
        generators.generate(ctx, rng).expect("generate")
    }

    #[test]
    fn numeric_respects_precision_and_scale() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut generators = ValueGenerators::default();
        let column = numeric_column(5, 2);
        for _ in 0..500 {
            let GeneratedValue::Numeric(text) = generate(&mut generators, &column, &mut rng) else {
                panic!("expected numeric");
            };
            let (integer, fraction) = text.split_once('.').expect("fraction present");
            assert!(integer.parse::<u64>().expect("integer part") < 1_000);
            assert_eq!(fraction.len(), 2);
            assert!(fraction.chars().all(|ch| ch.is_ascii_digit()));
        }
    }

    #[test]
    fn numeric_without_scale_has_no_fraction() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..100 {
            let text = random_numeric(3, 0, &mut rng);
            assert!(!text.contains('.'));
            assert!(text.parse::<u64>().expect("integer") < 1_000);
        }
    }

    #[test]
    fn wide_numeric_does_not_overflow() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let text = random_numeric(38, 4, &mut rng);
        let (integer, fraction) = text.split_once('.').expect("fraction present");
        assert!(integer.len() <= 34);
        assert_eq!(fraction.len(), 4);
    }

    #[test]
    fn unconstrained_numeric_uses_ten_two() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut generators = ValueGenerators::default();
        let column = column("numeric");
        let GeneratedValue::Numeric(text) = generate(&mut generators, &column, &mut rng) else {
            panic!("expected numeric");
        };
        let (integer, fraction) = text.split_once('.').expect("fraction present");
        assert!(integer.parse::<u64>().expect("integer part") < 100_000_000);
        assert_eq!(fraction.len(), 2);
    }

    #[test]
    fn integers_stay_within_width() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..500 {
            let value = random_integer(IntWidth::Small, Some(16), &mut rng);
            assert!((0..=i16::MAX as i64).contains(&value));
            let bounded = random_integer(IntWidth::Regular, Some(2), &mut rng);
            assert!((0..=99).contains(&bounded));
        }
    }

    #[test]
    fn character_values_are_truncated() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut generators = ValueGenerators::default();
        let mut column = column("character varying(5)");
        column.name = "description".to_string();
        column.column_type.character_max_length = Some(5);
        for _ in 0..50 {
            let GeneratedValue::Text(text) = generate(&mut generators, &column, &mut rng) else {
                panic!("expected text");
            };
            assert!(text.chars().count() <= 5);
        }
    }

    #[test]
    fn unique_columns_fall_back_to_paragraph_when_exhausted() {
        struct Always(NamedGenerator);
        impl GeneratorMatcher for Always {
            fn match_generator(&self, _context: &str) -> Option<NamedGenerator> {
                Some(self.0)
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut generators = ValueGenerators::new(Box::new(Always(NamedGenerator::CurrencyCode)));
        let table = TableKey::new("public", "codes");
        let mut column = column("character varying(1)");
        column.column_type.character_max_length = Some(1);
        let ctx = ColumnContext {
            table: &table,
            column: &column,
            enum_labels: None,
            unique: true,
        };

        let mut values = HashSet::new();
        for _ in 0..3 {
            let value = generators.generate(ctx, &mut rng).expect("generate");
            values.insert(value.to_sql_text().unwrap_or_default());
        }
        assert!(values.iter().all(|value| value.chars().count() <= 1));
    }

    #[test]
    fn unique_integers_take_next_unused_value_until_range_is_full() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut generators = ValueGenerators::default();
        let table = TableKey::new("public", "slots");
        let mut column = column("integer");
        column.column_type.numeric_precision = Some(1);
        let ctx = ColumnContext {
            table: &table,
            column: &column,
            enum_labels: None,
            unique: true,
        };

        let mut values = HashSet::new();
        for _ in 0..10 {
            let value = generators.generate(ctx, &mut rng).expect("generate");
            assert!(values.insert(value.as_i64().expect("integer")));
        }
        assert_eq!(values, (0..=9).collect::<HashSet<i64>>());

        let err = generators.generate(ctx, &mut rng).expect_err("range exhausted");
        assert!(matches!(err, GenerationError::UniqueExhausted(ref name) if name == "value"));
    }

    #[test]
    fn unique_uuids_and_numerics_do_not_repeat() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut generators = ValueGenerators::default();
        let table = TableKey::new("public", "ledger");
        let mut uuid_column = column("uuid");
        uuid_column.name = "entry_id".to_string();
        let mut numeric_column = numeric_column(3, 0);
        numeric_column.name = "code".to_string();

        let mut uuids = HashSet::new();
        let mut numerics = HashSet::new();
        for _ in 0..500 {
            let ctx = ColumnContext {
                table: &table,
                column: &uuid_column,
                enum_labels: None,
                unique: true,
            };
            let GeneratedValue::Uuid(text) = generators.generate(ctx, &mut rng).expect("uuid")
            else {
                panic!("expected uuid");
            };
            let parsed = uuid::Uuid::parse_str(&text).expect("valid uuid");
            assert_eq!(parsed.get_version_num(), 4);
            assert!(uuids.insert(text));

            let ctx = ColumnContext {
                column: &numeric_column,
                ..ctx
            };
            let value = generators.generate(ctx, &mut rng).expect("numeric");
            assert!(numerics.insert(value.to_sql_text().expect("text")));
        }
    }

    #[test]
    fn generator_selection_is_cached_per_column() {
        struct Counting(Arc<AtomicUsize>);
        impl GeneratorMatcher for Counting {
            fn match_generator(&self, _context: &str) -> Option<NamedGenerator> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Some(NamedGenerator::City)
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let mut generators = ValueGenerators::new(Box::new(Counting(calls.clone())));
        let table = TableKey::new("public", "offices");
        let column = column("text");

        let first = generators.generator_for(&table, &column);
        let second = generators.generator_for(&table, &column);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn enums_pick_declared_labels() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut generators = ValueGenerators::default();
        let table = TableKey::new("public", "orders");
        let column = column("order_status");
        let labels = vec!["new".to_string(), "paid".to_string()];
        let ctx = ColumnContext {
            table: &table,
            column: &column,
            enum_labels: Some(&labels),
            unique: false,
        };
        for _ in 0..20 {
            let value = generators.generate(ctx, &mut rng).expect("generate");
            assert!(matches!(value, GeneratedValue::Text(ref label) if labels.contains(label)));
        }
    }

    #[test]
    fn dates_fall_within_history_window() {
        let now = Utc::now();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut generators = ValueGenerators::default().with_now(now);
        let column = column("timestamp with time zone");
        for _ in 0..100 {
            let GeneratedValue::TimestampTz(instant) = generate(&mut generators, &column, &mut rng)
            else {
                panic!("expected timestamptz");
            };
            assert!(instant <= now);
            assert!(instant >= now - Duration::days(31 * 365));
        }
    }

    #[test]
    fn fallback_uses_null_or_minimal_default() {
        let mut nullable = column("integer");
        nullable.is_nullable = true;
        assert_eq!(fallback_value(&nullable, None), GeneratedValue::Null);
        assert_eq!(fallback_value(&column("integer"), None), GeneratedValue::Int(0));
        assert_eq!(
            fallback_value(&column("jsonb"), None),
            GeneratedValue::Json(serde_json::json!({}))
        );
        assert_eq!(
            fallback_value(&column("interval"), None),
            GeneratedValue::Interval("00:00:00".to_string())
        );
    }
}
