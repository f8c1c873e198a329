use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Token ids and attention mask for a batch, padded to the longest entry
/// (capped at `max_len`). Both tensors are `[B,T]` u32.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let width = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(texts.len() * width);
    let mut mask = Vec::with_capacity(texts.len() * width);
    for enc in &encodings {
        let mut row_ids = enc.get_ids().to_vec();
        let mut row_mask = enc.get_attention_mask().to_vec();
        row_ids.truncate(width);
        row_mask.truncate(width);
        let pad = width - row_ids.len();
        row_ids.extend(std::iter::repeat(0).take(pad));
        row_mask.extend(std::iter::repeat(0).take(pad));
        ids.extend(row_ids);
        mask.extend(row_mask);
    }
    let input_ids = Tensor::from_vec(ids, (encodings.len(), width), device)?;
    let attention_mask = Tensor::from_vec(mask, (encodings.len(), width), device)?;
    Ok((input_ids, attention_mask))
}
