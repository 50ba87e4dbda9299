//! Sentence-transformer complaint embeddings through ONNX Runtime.
//!
//! Expects a model directory holding `model.onnx` and `tokenizer.json`
//! (all-MiniLM-L6-v2 or a compatible BERT-style export).

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, anyhow, ensure};
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use tokenizers::{Encoding, PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::embedder::{Embed, normalize};

/// Complaints rarely run past a paragraph; longer input is truncated.
const MAX_TOKENS: usize = 256;
const FALLBACK_DIM: usize = 384;

pub struct OnnxEmbedder {
    /// `Session::run` takes `&mut self`; duplicate checks queue here.
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dim: usize,
}

impl OnnxEmbedder {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model = model_dir.join("model.onnx");
        let vocab = model_dir.join("tokenizer.json");
        for required in [&model, &vocab] {
            ensure!(required.is_file(), "missing {}", required.display());
        }

        let session = Session::builder()?
            .commit_from_file(&model)
            .with_context(|| format!("opening {}", model.display()))?;
        let dim = session
            .outputs()
            .first()
            .and_then(|out| hidden_size(out.dtype()))
            .unwrap_or(FALLBACK_DIM);

        let mut tokenizer = Tokenizer::from_file(&vocab).map_err(|e| anyhow!("{e}"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("configuring truncation: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        info!(dim, max_tokens = MAX_TOKENS, dir = %model_dir.display(), "onnx embedder ready");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dim,
        })
    }
}

impl Embed for OnnxEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("tokenizing complaints: {e}"))?;
        let batch = TokenBatch::from_encodings(&encodings);
        debug!(rows = batch.rows, width = batch.width, "running embedding model");

        let shape = [batch.rows as i64, batch.width as i64];
        let ids = Tensor::from_array((shape, batch.ids.into_boxed_slice()))?;
        let mask = Tensor::from_array((shape, batch.mask.clone().into_boxed_slice()))?;
        let types = Tensor::from_array((shape, batch.type_ids.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("onnx session lock poisoned"))?;
        let outputs = session.run(ort::inputs![
            "input_ids" => ids,
            "attention_mask" => mask,
            "token_type_ids" => types,
        ])?;
        let (out_shape, hidden) = outputs[0].try_extract_tensor::<f32>()?;
        let out_shape: &[i64] = out_shape;

        // [rows, tokens, dim]
        ensure!(
            out_shape.len() == 3
                && out_shape[0] as usize == batch.rows
                && out_shape[2] as usize == self.dim,
            "model returned shape {out_shape:?}; wanted [{}, _, {}]",
            batch.rows,
            self.dim
        );
        let tokens = out_shape[1] as usize;

        Ok((0..batch.rows)
            .map(|row| {
                let states = &hidden[row * tokens * self.dim..(row + 1) * tokens * self.dim];
                let mask = &batch.mask[row * batch.width..(row + 1) * batch.width];
                let mut pooled = mean_pool(states, mask, self.dim);
                normalize(&mut pooled);
                pooled
            })
            .collect())
    }
}

/// Row-major `[rows, width]` model inputs, zero-padded.
struct TokenBatch {
    rows: usize,
    width: usize,
    ids: Vec<i64>,
    mask: Vec<i64>,
    type_ids: Vec<i64>,
}

impl TokenBatch {
    fn from_encodings(encodings: &[Encoding]) -> Self {
        let rows = encodings.len();
        let width = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let mut batch = Self {
            rows,
            width,
            ids: vec![0; rows * width],
            mask: vec![0; rows * width],
            type_ids: vec![0; rows * width],
        };
        for (row, enc) in encodings.iter().enumerate() {
            let start = row * width;
            let fields = [
                (&mut batch.ids, enc.get_ids()),
                (&mut batch.mask, enc.get_attention_mask()),
                (&mut batch.type_ids, enc.get_type_ids()),
            ];
            for (dst, src) in fields {
                for (slot, &v) in dst[start..].iter_mut().zip(src) {
                    *slot = i64::from(v);
                }
            }
        }
        batch
    }
}

/// Average the hidden states of attended tokens. `states` holds one
/// `dim`-wide vector per token; tokens beyond `mask` are ignored.
fn mean_pool(states: &[f32], mask: &[i64], dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut attended = 0usize;
    for (token, _) in states.chunks_exact(dim).zip(mask).filter(|(_, m)| **m > 0) {
        for (p, v) in pooled.iter_mut().zip(token) {
            *p += v;
        }
        attended += 1;
    }
    if attended > 0 {
        let n = attended as f32;
        pooled.iter_mut().for_each(|p| *p /= n);
    }
    pooled
}

fn hidden_size(output: &ValueType) -> Option<usize> {
    let ValueType::Tensor { shape, .. } = output else {
        return None;
    };
    let last = shape.last().and_then(|&d| usize::try_from(d).ok());
    last.filter(|&d| d > 0)
}
