use sha2::{Digest, Sha256};

/// Deterministic stand-in embedding for offline runs and fixtures.
///
/// Hashes the model id and the text into a fixed-dimension vector with
/// components in [-1, 1). Not semantically meaningful; it only guarantees
/// that equal inputs embed equally and distinct model ids diverge.
pub fn deterministic_embedding(text: &str, model_id: &str, dims: usize) -> Vec<f32> {
    let dims = dims.max(1);

    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut out = Vec::with_capacity(dims);
    for i in 0..dims {
        let byte = digest[i % digest.len()];
        out.push((byte as f32 / 127.5) - 1.0);
    }

    out
}
