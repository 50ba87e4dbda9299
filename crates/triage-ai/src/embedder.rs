//! Embedding capability shared by every duplicate check.
//!
//! The process loads exactly one embedder at startup and hands it around as
//! `Arc<dyn Embed>`. [`HashEmbedder`] is the default backend; the ONNX
//! sentence-transformers backend lives behind the `onnx` feature.

/// Text → fixed-dimension vector.
pub trait Embed: Send + Sync {
    /// Output dimensionality.
    fn dim(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic feature-hashing embedder.
///
/// Lower-cased word unigrams and bigrams are hashed with FNV-1a into `dim`
/// signed buckets, then the vector is L2-normalised. Texts sharing
/// vocabulary land close together; no model download is needed.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        let tokens = tokenize(text);

        for tok in &tokens {
            self.add_feature(&mut v, tok.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut v, bigram.as_bytes(), BIGRAM_WEIGHT);
        }

        normalize(&mut v);
        v
    }

    fn add_feature(&self, v: &mut [f32], bytes: &[u8], weight: f32) {
        let h = fnv1a(bytes);
        let idx = (h % self.dim as u64) as usize;
        // Top bit picks the sign so collisions tend to cancel.
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        v[idx] += sign * weight;
    }
}

impl Embed for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Lower-cased alphanumeric word tokens.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h = FNV_OFFSET;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// L2-normalize a vector in place.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity. Inputs need not be normalised; a zero vector scores 0.
pub fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_single_text_is_unit_norm() {
        let embedder = HashEmbedder::default();
        let vec = embedder.embed("Street light not working at night").unwrap();
        assert_eq!(vec.len(), 384);
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "expected unit norm, got {norm}");
    }

    #[test]
    fn embed_is_deterministic_and_case_insensitive() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Garbage truck did not come").unwrap();
        let b = embedder.embed("GARBAGE truck did NOT come!").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("  ...  ").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn similar_texts_closer() {
        let embedder = HashEmbedder::default();
        let pothole = embedder.embed("deep pothole on the main road").unwrap();
        let pothole2 = embedder.embed("huge pothole on main road near market").unwrap();
        let noise = embedder.embed("loud music from the neighbours party").unwrap();

        let close = cosine_sim(&pothole, &pothole2);
        let far = cosine_sim(&pothole, &noise);
        assert!(
            close > far,
            "pothole↔pothole ({close:.4}) should beat pothole↔noise ({far:.4})"
        );
    }

    #[test]
    fn embed_empty_batch() {
        let embedder = HashEmbedder::default();
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_sim(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_sim(&[2.0, 0.0], &[1.0, 0.0]), 1.0);
    }
}
