//! BERT sentence embeddings on candle.
//!
//! Loads a sentence-transformers style model directory containing
//! `tokenizer.json`, `config.json` and `pytorch_model.bin`, mean-pools the last
//! hidden state over the tokens and L2 normalizes the result.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_transformers::models::bert::{BertModel, Config};
use tokenizers::Tokenizer;
use tracing::info;

use super::{EmbeddingError, EmbeddingFunction, Result};

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

pub struct EmbeddingGenerator {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl std::fmt::Debug for EmbeddingGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGenerator")
            .field("device", &self.device)
            .field("dimension", &self.dimension)
            .field("model", &"<BertModel>")
            .field("tokenizer", &"<Tokenizer>")
            .finish()
    }
}

impl EmbeddingGenerator {
    /// Loads `./models/all-MiniLM-L6-v2`
    pub fn new() -> Result<Self> {
        Self::new_from_path(format!("./models/{}", DEFAULT_EMBEDDING_MODEL))
    }

    pub fn new_from_path(model_path: impl AsRef<Path>) -> Result<Self> {
        let device = Device::Cpu;
        let model_dir = model_path.as_ref();

        let tokenizer = Tokenizer::from_file(required_file(model_dir, "tokenizer.json")?)
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to load tokenizer: {}", e)))?;

        let config_str = std::fs::read_to_string(required_file(model_dir, "config.json")?)
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to read config: {}", e)))?;
        let config: Config = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to parse config: {}", e)))?;
        let dimension = config.hidden_size;

        let weights = candle_nn::VarBuilder::from_pth(
            required_file(model_dir, "pytorch_model.bin")?,
            DType::F32,
            &device,
        )
        .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to load weights: {}", e)))?;
        let model = BertModel::load(weights, &config)
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to create model: {}", e)))?;

        info!("Loaded BERT model from {} (dimension {})", model_dir.display(), dimension);
        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
        })
    }

    fn embed(&self, ids: &[u32]) -> candle_core::Result<Vec<f32>> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;

        // (1, tokens, hidden) -> (hidden)
        let hidden = self.model.forward(&input_ids, &token_type_ids, None)?;
        let pooled = hidden.mean(1)?.squeeze(0)?.to_dtype(DType::F32)?;
        pooled.to_vec1::<f32>()
    }
}

impl EmbeddingFunction for EmbeddingGenerator {
    fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let ids = tokenize(&self.tokenizer, text)?;
        let embedding = self
            .embed(&ids)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Ok(embedding.into_iter().map(|x| x / norm).collect())
        } else {
            Ok(embedding)
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn tokenize(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;
    Ok(encoding.get_ids().to_vec())
}

fn required_file(model_dir: &Path, name: &str) -> Result<std::path::PathBuf> {
    let path = model_dir.join(name);
    if !path.exists() {
        return Err(EmbeddingError::ModelLoading(format!(
            "{} not found. Please ensure the model is properly downloaded.",
            path.display()
        )));
    }
    Ok(path)
}
