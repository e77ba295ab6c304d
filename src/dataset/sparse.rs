use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Explicit `index -> value` map with 1-based indices.
///
/// Ordered iteration gives strictly increasing indices; absent indices are
/// zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseFeatures(BTreeMap<u32, f64>);

impl SparseFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a dense vector; position `i` becomes index `i + 1`.
    pub fn from_dense(values: &[f32], omit_zeros: bool) -> Self {
        values
            .iter()
            .enumerate()
            .filter(|(_, value)| !omit_zeros || **value != 0.0)
            .map(|(position, value)| (position as u32 + 1, f64::from(*value)))
            .collect()
    }

    /// Set `index` to `value`, returning the previous value.
    pub fn insert(&mut self, index: u32, value: f64) -> Option<f64> {
        self.0.insert(index, value)
    }

    pub fn get(&self, index: u32) -> Option<f64> {
        self.0.get(&index).copied()
    }

    /// `(index, value)` pairs in increasing index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.0.iter().map(|(index, value)| (*index, *value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max_index(&self) -> Option<u32> {
        self.0.keys().next_back().copied()
    }

    /// Expand into a dense vector of `len`; indices beyond `len` are dropped.
    pub fn to_dense(&self, len: usize) -> Vec<f64> {
        let mut dense = vec![0.0; len];
        for (index, value) in self.iter() {
            if let Some(slot) = (index as usize).checked_sub(1).and_then(|pos| dense.get_mut(pos)) {
                *slot = value;
            }
        }
        dense
    }
}

impl FromIterator<(u32, f64)> for SparseFeatures {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_conversion_is_one_based() {
        let sparse = SparseFeatures::from_dense(&[0.5, 0.0, 2.0], true);
        assert_eq!(sparse.iter().collect::<Vec<_>>(), vec![(1, 0.5), (3, 2.0)]);
        assert_eq!(sparse.max_index(), Some(3));
        assert_eq!(sparse.to_dense(3), vec![0.5, 0.0, 2.0]);
        assert_eq!(sparse.to_dense(2), vec![0.5, 0.0]);
    }

    #[test]
    fn keeps_zeros_when_asked() {
        let sparse = SparseFeatures::from_dense(&[0.0, 1.0], false);
        assert_eq!(sparse.len(), 2);
        assert_eq!(sparse.get(1), Some(0.0));
    }
}
