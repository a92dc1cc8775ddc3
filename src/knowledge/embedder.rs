//! Text embedding backends

use async_trait::async_trait;

use crate::{Error, Result};

/// Default dimension for the local hashing embedder
pub const DEFAULT_HASHING_DIM: usize = 256;

/// Default `OpenAI` embedding model
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// Maps text to fixed-dimension vectors
///
/// The same embedder instance must be used for indexing and querying.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails or returns nothing
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
    }
}

/// Embedder backed by an `OpenAI`-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbedder {
    /// Create an embedder for `model` at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn new(api_key: String, model: String, base_url: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for embeddings".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
            index: usize,
        }

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(texts = texts.len(), model = %self.model, "requesting embeddings");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "embedding API error {status}: {body}"
            )));
        }

        let mut result: EmbeddingResponse = response.json().await?;

        // Sort by index to maintain input order
        result.data.sort_by_key(|d| d.index);

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Local, deterministic feature-hashing embedder
///
/// Each lowercase alphanumeric token is hashed into one of `dimension`
/// buckets with a sign taken from the hash, and the result is L2-normalized.
/// Texts sharing vocabulary land close together. Needs no network or model
/// download, which makes it the default for small corpora and tests.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create a hashing embedder producing vectors of `dimension`
    ///
    /// # Errors
    ///
    /// Returns error if `dimension` is zero
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config(
                "hashing embedder dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    /// Output dimension
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed one text synchronously
    #[must_use]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASHING_DIM,
        }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Lowercase alphanumeric tokens
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// 64-bit FNV-1a, stable across platforms and releases
const fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(PRIME);
        i += 1;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::index::squared_l2;

    #[test]
    fn test_empty_api_key() {
        let result = OpenAiEmbedder::new(
            String::new(),
            DEFAULT_OPENAI_MODEL.to_string(),
            "https://api.openai.com/v1".to_string(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn test_hashing_is_deterministic() {
        let embedder = HashingEmbedder::new(64).unwrap();
        assert_eq!(
            embedder.embed_text("Chlorophyll absorbs light"),
            embedder.embed_text("Chlorophyll absorbs light")
        );
    }

    #[test]
    fn test_hashing_dimension_and_norm() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let v = embedder.embed_text("glucose and oxygen");
        assert_eq!(v.len(), 32);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::default();
        let v = embedder.embed_text("  ...  ");
        assert_eq!(v.len(), DEFAULT_HASHING_DIM);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_hashing_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.embed_text("Where is GLUCOSE?"),
            embedder.embed_text("where is glucose")
        );
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_text("what does chlorophyll absorb");
        let related = embedder.embed_text("chlorophyll is a pigment that can absorb sunlight");
        let unrelated = embedder.embed_text("oxygen is released into the atmosphere");
        assert!(squared_l2(&query, &related) < squared_l2(&query, &unrelated));
    }

    #[test]
    fn test_batch_preserves_order() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let batch = tokio_test::block_on(embedder.embed(&["alpha", "beta"])).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed_text("alpha"));
        assert_eq!(batch[1], embedder.embed_text("beta"));
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
