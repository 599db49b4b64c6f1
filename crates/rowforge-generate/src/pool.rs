use std::collections::HashMap;

use rand::{Rng, RngCore};

use rowforge_core::TableKey;

use crate::value::GeneratedValue;

/// Key captured from an inserted row, aligned with the table's pooled key columns.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolKey {
    Scalar(GeneratedValue),
    Composite(Vec<GeneratedValue>),
}

impl PoolKey {
    pub fn from_values(mut values: Vec<GeneratedValue>) -> Self {
        if values.len() == 1 {
            PoolKey::Scalar(values.remove(0))
        } else {
            PoolKey::Composite(values)
        }
    }

    /// Component at `idx` of the table's key column list.
    pub fn get(&self, idx: usize) -> Option<&GeneratedValue> {
        match self {
            PoolKey::Scalar(value) => (idx == 0).then_some(value),
            PoolKey::Composite(values) => values.get(idx),
        }
    }
}

/// Keys returned by completed inserts, per table. Append-only within a run.
#[derive(Debug, Default)]
pub struct PrimaryKeyPool {
    keys: HashMap<TableKey, Vec<PoolKey>>,
}

impl PrimaryKeyPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, table: &TableKey, keys: impl IntoIterator<Item = PoolKey>) {
        self.keys.entry(table.clone()).or_default().extend(keys);
    }

    pub fn keys(&self, table: &TableKey) -> &[PoolKey] {
        self.keys.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, table: &TableKey) -> usize {
        self.keys(table).len()
    }

    pub fn is_empty(&self, table: &TableKey) -> bool {
        self.keys(table).is_empty()
    }

    /// Uniform random pick; `None` while the table has no inserted rows.
    pub fn pick(&self, table: &TableKey, rng: &mut dyn RngCore) -> Option<&PoolKey> {
        let keys = self.keys(table);
        if keys.is_empty() {
            return None;
        }
        keys.get(rng.random_range(0..keys.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn picks_only_appended_keys() {
        let table = TableKey::new("public", "parent");
        let mut pool = PrimaryKeyPool::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(pool.pick(&table, &mut rng).is_none());

        pool.append(
            &table,
            (1..=3).map(|id| PoolKey::Scalar(GeneratedValue::Int(id))),
        );
        assert_eq!(pool.len(&table), 3);
        for _ in 0..20 {
            let key = pool.pick(&table, &mut rng).expect("key");
            let id = key.get(0).and_then(GeneratedValue::as_i64).expect("int");
            assert!((1..=3).contains(&id));
        }
    }

    #[test]
    fn composite_keys_expose_components() {
        let key = PoolKey::from_values(vec![GeneratedValue::Int(1), GeneratedValue::Int(2)]);
        assert_eq!(key.get(1), Some(&GeneratedValue::Int(2)));
        assert_eq!(key.get(2), None);
        assert!(matches!(
            PoolKey::from_values(vec![GeneratedValue::Int(9)]),
            PoolKey::Scalar(_)
        ));
    }
}
