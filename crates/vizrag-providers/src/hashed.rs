use async_trait::async_trait;
use sha2::{Digest as _, Sha256};
use vizrag_core::{Embedding, EmbeddingProvider, ProviderError};

/// Default vector dimension of the hashed embedder.
pub const DEFAULT_DIMENSION: usize = 1024;

/// Deterministic offline embedder.
///
/// Each lowercased word (with a trailing plural `s` stripped) is hashed with
/// SHA-256 into one of `dimension` buckets; the bucket counts are L2-normalised. Texts
/// sharing vocabulary get high cosine similarity, which is enough to exercise
/// retrieval without a model server.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashedEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("hashed-bow-{dimension}"),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed `text` synchronously.
    pub fn vector(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in tokens(text) {
            vector[bucket(&token, self.dimension)] += 1.0;
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

/// Bucket of `token`: the first eight digest bytes, big-endian, modulo `dimension`.
///
/// Stable across toolchains, so persisted hashed indexes stay comparable.
fn bucket(token: &str, dimension: usize) -> usize {
    let digest = Sha256::digest(token.as_bytes());
    let mut prefix = [0_u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % dimension as u64) as usize
}

/// Lowercased alphanumeric words with a naive plural `s` removed.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|character: char| !character.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            match lower.strip_suffix('s') {
                Some(stem) if stem.len() > 2 && !stem.ends_with('s') => stem.to_owned(),
                _ => lower,
            }
        })
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(lhs: &[f32], rhs: &[f32]) -> f32 {
        lhs.iter().zip(rhs).map(|(first, second)| first * second).sum()
    }

    #[test]
    fn test_tokens_normalise_case_and_plurals() {
        let words: Vec<String> = tokens("Pie Charts, pie-chart; class").collect();
        assert_eq!(words, vec!["pie", "chart", "pie", "chart", "class"]);
    }

    #[test]
    fn test_vectors_are_unit_length_and_deterministic() {
        let embedder = HashedEmbedder::default();
        let first = embedder.vector("Dashboards need a clear focus");
        let second = embedder.vector("Dashboards need a clear focus");
        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_DIMENSION);
        assert!((cosine(&first, &first) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_blank_text_is_zero_vector() {
        let embedder = HashedEmbedder::new(8);
        assert!(embedder.vector("  ...  ").iter().all(|value| *value == 0.0));
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = HashedEmbedder::default();
        let query = embedder.vector("When should I use a pie chart?");
        let related = embedder.vector("Pie charts show parts of a whole.");
        let unrelated = embedder.vector("Cows say moo in the field.");
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_buckets_are_pinned() {
        assert_eq!(bucket("pie", 1024), 662);
        assert_eq!(bucket("chart", 1024), 207);
        assert_eq!(bucket("pie", 64), 22);

        let vector = HashedEmbedder::new(1024).vector("Pie charts");
        let filled: Vec<usize> = vector
            .iter()
            .enumerate()
            .filter(|(_, value)| **value > 0.0)
            .map(|(position, _)| position)
            .collect();
        assert_eq!(filled, vec![207, 662]);
    }

    #[test]
    fn test_model_id_encodes_dimension() {
        assert_eq!(HashedEmbedder::new(64).model_id(), "hashed-bow-64");
        assert_eq!(HashedEmbedder::new(0).dimension(), 1);
    }
}
