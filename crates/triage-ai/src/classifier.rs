//! Centroid-based text classification over TF-IDF vectors.
//!
//! Training builds a unigram + bigram vocabulary, weights terms with smoothed
//! IDF, and averages the L2-normalised document vectors of each label into a
//! centroid. Prediction picks the centroid with the highest cosine
//! similarity; confidence is that label's share of a temperature-scaled
//! softmax over all similarities.
//!
//! The same model type serves both the category slot and the priority slot;
//! only the labels differ.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedder::{normalize, tokenize};

/// Sharpens the softmax so a clear winner reads close to 1.0.
const SOFTMAX_SCALE: f32 = 10.0;

/// One training row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledText {
    pub text: String,
    pub label: String,
}

impl LabeledText {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Label plus confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("no training examples")]
    NoExamples,
    #[error("training examples produced an empty vocabulary")]
    EmptyVocabulary,
    #[error("{0}")]
    Other(String),
}

/// Fits a [`TextClassifier`] from labelled examples.
///
/// The lifecycle manager only talks to this seam, so alternative fitting
/// strategies (or failing ones, in tests) can be swapped in.
pub trait Trainer: Send + Sync {
    fn fit(&self, examples: &[LabeledText]) -> Result<TextClassifier, TrainError>;
}

/// Default [`Trainer`]: TF-IDF centroids.
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidTrainer;

impl Trainer for CentroidTrainer {
    fn fit(&self, examples: &[LabeledText]) -> Result<TextClassifier, TrainError> {
        TextClassifier::fit(examples)
    }
}

/// Trained, immutable classifier. Serializable so it can be persisted as an
/// artifact and loaded back without refitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextClassifier {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    /// label → normalised centroid over the vocabulary.
    centroids: BTreeMap<String, Vec<f32>>,
    /// label → number of training examples, used as a prior when a text
    /// shares no vocabulary with the training set.
    label_counts: BTreeMap<String, usize>,
}

impl TextClassifier {
    /// Fit a classifier. Fails when there is nothing to learn from.
    pub fn fit(examples: &[LabeledText]) -> Result<Self, TrainError> {
        if examples.is_empty() {
            return Err(TrainError::NoExamples);
        }

        let docs: Vec<Vec<String>> = examples.iter().map(|e| terms(&e.text)).collect();

        // Vocabulary and document frequency.
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut df: Vec<usize> = Vec::new();
        for doc in &docs {
            let mut seen: Vec<usize> = Vec::new();
            for term in doc {
                let next = vocabulary.len();
                let idx = *vocabulary.entry(term.clone()).or_insert(next);
                if idx == df.len() {
                    df.push(0);
                }
                if !seen.contains(&idx) {
                    seen.push(idx);
                    df[idx] += 1;
                }
            }
        }
        if vocabulary.is_empty() {
            return Err(TrainError::EmptyVocabulary);
        }

        // Smoothed IDF: ln((1 + n) / (1 + df)) + 1.
        let n = docs.len() as f32;
        let idf: Vec<f32> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0)
            .collect();

        let dim = vocabulary.len();
        let mut accum: BTreeMap<&str, (Vec<f32>, usize)> = BTreeMap::new();
        let mut label_counts: BTreeMap<String, usize> = BTreeMap::new();

        for (example, doc) in examples.iter().zip(&docs) {
            *label_counts.entry(example.label.clone()).or_default() += 1;
            let vec = tfidf(doc, &vocabulary, &idf);
            let entry = accum
                .entry(example.label.as_str())
                .or_insert_with(|| (vec![0.0f32; dim], 0));
            for (idx, w) in vec {
                entry.0[idx] += w;
            }
            entry.1 += 1;
        }

        let centroids = accum
            .into_iter()
            .map(|(label, (mut sum, count))| {
                for v in &mut sum {
                    *v /= count as f32;
                }
                normalize(&mut sum);
                (label.to_string(), sum)
            })
            .collect();

        Ok(Self {
            vocabulary,
            idf,
            centroids,
            label_counts,
        })
    }

    /// Most likely label.
    pub fn predict(&self, text: &str) -> String {
        self.predict_with_confidence(text).label
    }

    /// Most likely label with its confidence.
    pub fn predict_with_confidence(&self, text: &str) -> Prediction {
        let query = tfidf(&terms(text), &self.vocabulary, &self.idf);

        if query.is_empty() {
            return self.prior();
        }

        let sims: Vec<(&str, f32)> = self
            .centroids
            .iter()
            .map(|(label, centroid)| {
                let sim: f32 = query.iter().map(|&(idx, w)| centroid[idx] * w).sum();
                (label.as_str(), sim)
            })
            .collect();

        let (best_label, best_sim) = best_match(&sims);
        let denom: f32 = sims
            .iter()
            .map(|(_, s)| ((s - best_sim) * SOFTMAX_SCALE).exp())
            .sum();
        let confidence = if denom > 0.0 { 1.0 / denom } else { 0.0 };

        Prediction {
            label: best_label.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Labels known to the model, sorted.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.centroids.keys().map(|s| s.as_str())
    }

    /// Number of distinct terms.
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Number of examples the model was fitted on.
    pub fn example_count(&self) -> usize {
        self.label_counts.values().sum()
    }

    fn prior(&self) -> Prediction {
        let total = self.example_count().max(1) as f32;
        let mut best: Option<(&String, usize)> = None;
        for (label, &count) in &self.label_counts {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((label, count));
            }
        }
        match best {
            Some((label, count)) => Prediction {
                label: label.clone(),
                confidence: count as f32 / total,
            },
            None => Prediction {
                label: String::new(),
                confidence: 0.0,
            },
        }
    }
}

/// Highest similarity; ties keep the label that sorts first.
fn best_match<'a>(sims: &[(&'a str, f32)]) -> (&'a str, f32) {
    let mut best_label = "";
    let mut best_sim = f32::NEG_INFINITY;
    for &(label, sim) in sims {
        if sim > best_sim {
            best_sim = sim;
            best_label = label;
        }
    }
    (best_label, best_sim)
}

/// Unigrams followed by space-joined bigrams.
fn terms(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut out = Vec::with_capacity(tokens.len() * 2);
    for pair in tokens.windows(2) {
        out.push(format!("{} {}", pair[0], pair[1]));
    }
    out.extend(tokens);
    out
}

/// Sparse, L2-normalised TF-IDF vector. Unknown terms are ignored.
fn tfidf(
    terms: &[String],
    vocabulary: &HashMap<String, usize>,
    idf: &[f32],
) -> Vec<(usize, f32)> {
    let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
    for term in terms {
        if let Some(&idx) = vocabulary.get(term) {
            *counts.entry(idx).or_default() += 1.0;
        }
    }
    let mut vec: Vec<(usize, f32)> = counts
        .into_iter()
        .map(|(idx, tf)| (idx, tf * idf[idx]))
        .collect();
    let norm: f32 = vec.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in &mut vec {
            *w /= norm;
        }
    }
    vec
}
