//! Exact L2 vector index with stable integer ids

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Brute-force index over row-major `f32` vectors
///
/// Ids are assigned sequentially and never reused, so removing a vector does
/// not disturb the ids held elsewhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlatIndex {
    dimensions: usize,
    ids: Vec<u64>,
    vectors: Vec<f32>,
    next_id: u64,
}

impl FlatIndex {
    /// Create an index; `dimensions == 0` lets the first insert fix it
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    /// Vector width, 0 while still unset
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` is present
    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Add vectors, returning their ids in input order
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Vec<u64>> {
        let Some(first) = vectors.first() else {
            return Ok(Vec::new());
        };

        let dimensions = if self.dimensions == 0 {
            first.len()
        } else {
            self.dimensions
        };
        if dimensions == 0 {
            return Err(Error::index("Cannot add zero-length vectors"));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(Error::index(format!(
                "Dimension mismatch: index has {}, got {}",
                dimensions,
                bad.len()
            )));
        }

        self.dimensions = dimensions;
        let mut assigned = Vec::with_capacity(vectors.len());
        for vector in vectors {
            let id = self.next_id;
            self.next_id += 1;
            self.ids.push(id);
            self.vectors.extend_from_slice(vector);
            assigned.push(id);
        }
        Ok(assigned)
    }

    /// Remove the given ids, returning how many were present
    pub fn remove(&mut self, ids: &[u64]) -> usize {
        if ids.is_empty() || self.ids.is_empty() {
            return 0;
        }

        let dim = self.dimensions;
        let before = self.ids.len();
        let mut kept_ids = Vec::with_capacity(before);
        let mut kept_vectors = Vec::with_capacity(self.vectors.len());

        for (row, id) in self.ids.iter().enumerate() {
            if !ids.contains(id) {
                kept_ids.push(*id);
                kept_vectors.extend_from_slice(&self.vectors[row * dim..(row + 1) * dim]);
            }
        }

        self.ids = kept_ids;
        self.vectors = kept_vectors;
        before - self.ids.len()
    }

    /// The `k` nearest vectors as `(id, squared L2 distance)`, closest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        if self.ids.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(Error::index(format!(
                "Query dimension mismatch: index has {}, got {}",
                self.dimensions,
                query.len()
            )));
        }

        let mut scored: Vec<(u64, f32)> = self
            .ids
            .iter()
            .zip(self.vectors.chunks_exact(self.dimensions))
            .map(|(id, row)| (*id, squared_l2(query, row)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = FlatIndex::new(0);
        let ids = index
            .add(&[vec![0.0, 0.0], vec![3.0, 4.0], vec![1.0, 0.0]])
            .unwrap();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(index.dimensions(), 2);

        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(hits, vec![(0, 0.0), (2, 1.0)]);

        let all = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], (1, 25.0));
    }

    #[test]
    fn test_ties_broken_by_id() {
        let mut index = FlatIndex::new(1);
        index.add(&[vec![1.0], vec![-1.0]]).unwrap();
        let hits = index.search(&[0.0], 2).unwrap();
        assert_eq!(hits, vec![(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn test_remove_keeps_ids_stable() {
        let mut index = FlatIndex::new(1);
        index.add(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();

        assert_eq!(index.remove(&[1, 42]), 1);
        assert_eq!(index.len(), 2);
        assert!(!index.contains(1));

        let next = index.add(&[vec![2.0]]).unwrap();
        assert_eq!(next, vec![3]);

        let hits = index.search(&[2.0], 1).unwrap();
        assert_eq!(hits, vec![(3, 0.0)]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatIndex::new(0);
        index.add(&[vec![1.0, 2.0]]).unwrap();
        assert!(matches!(index.add(&[vec![1.0]]), Err(Error::Index(_))));
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_empty_index_search() {
        let index = FlatIndex::new(3);
        assert!(index.search(&[0.0, 0.0, 0.0], 5).unwrap().is_empty());
        assert!(index.is_empty());
    }
}
