use std::collections::BTreeMap;
use std::fmt;

/// Immutable name to value lookup, built once from a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable<K, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> SymbolTable<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }
}

impl<K: Ord, V> From<BTreeMap<K, V>> for SymbolTable<K, V> {
    fn from(entries: BTreeMap<K, V>) -> Self {
        Self { entries }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for SymbolTable<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<K: Ord, V> Default for SymbolTable<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

/// Formats as `[k1 -> v1, k2 -> v2]`.
impl<K: fmt::Display, V: fmt::Display> fmt::Display for SymbolTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, (key, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key} -> {value}")?;
        }
        f.write_str("]")
    }
}
