//! Embedding blob encoding: little-endian f32, one value per dimension.

use ndarray::Array1;

/// Encode an embedding as a little-endian f32 blob.
pub fn encode_f32(embedding: &Array1<f32>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding.iter() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a blob written by [`encode_f32`]. Trailing partial values are ignored.
pub fn decode_f32(bytes: &[u8]) -> Array1<f32> {
    Array1::from_iter(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
    )
}

/// L2-normalize; `None` for (near) zero vectors.
pub fn normalize(embedding: &Array1<f32>) -> Option<Array1<f32>> {
    let norm = embedding.dot(embedding).sqrt();
    if norm < 1e-9 {
        None
    } else {
        Some(embedding / norm)
    }
}
