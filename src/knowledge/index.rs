//! Vector index for nearest-neighbor search over chunk embeddings

use crate::{Error, Result};

/// A single search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Chunk index (insertion position)
    pub index: usize,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// Nearest-neighbor index over fixed-dimension vectors
///
/// Implementations are built once with [`VectorIndex::add_all`] and are
/// read-only afterwards. Callers rely only on `search` returning hits in
/// ascending distance order, not on the search being exact.
pub trait VectorIndex: Send + Sync {
    /// Dimension every stored and query vector must have
    fn dimension(&self) -> usize;

    /// Number of stored vectors
    fn len(&self) -> usize;

    /// Whether the index holds no vectors
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert all vectors; position `i` becomes chunk index `i`
    ///
    /// # Errors
    ///
    /// Returns error if the index was already built or a vector has the
    /// wrong dimension
    fn add_all(&mut self, vectors: Vec<Vec<f32>>) -> Result<()>;

    /// Return up to `k` neighbors of `query`, closest first
    ///
    /// # Errors
    ///
    /// Returns error if `query` has the wrong dimension
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Exact brute-force index using squared Euclidean distance
///
/// Vectors are stored contiguously. Ties are broken by insertion order.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
    frozen: bool,
}

impl FlatIndex {
    /// Create an empty index for vectors of `dimension`
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            frozen: false,
        }
    }

    /// Vector stored at `index`
    #[must_use]
    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    fn check_dimension(&self, found: usize) -> Result<()> {
        if found == self.dimension {
            Ok(())
        } else {
            Err(Error::EmbeddingDimensionMismatch {
                expected: self.dimension,
                found,
            })
        }
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            return 0;
        }
        self.data.len() / self.dimension
    }

    fn add_all(&mut self, vectors: Vec<Vec<f32>>) -> Result<()> {
        if self.frozen {
            return Err(Error::IndexFrozen);
        }

        for vector in &vectors {
            self.check_dimension(vector.len())?;
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend(vector);
        }
        self.frozen = true;

        tracing::debug!(
            vectors = self.len(),
            dimension = self.dimension,
            "flat index built"
        );
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query.len())?;

        if k == 0 || self.dimension == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(index, vector)| Neighbor {
                index,
                distance: squared_l2(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.index.cmp(&b.index))
        });
        hits.truncate(k);

        Ok(hits)
    }
}

/// Squared Euclidean distance between two equal-length vectors
#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
