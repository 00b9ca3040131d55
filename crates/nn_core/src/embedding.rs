use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Fixed-length vector produced by a [`crate::TextEmbedder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn magnitude(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Scales the vector to unit length. Zero vectors are left as they are.
    pub fn normalize(mut self) -> Self {
        let magnitude = self.magnitude();
        if magnitude > 0.0 {
            self.0.iter_mut().for_each(|x| *x /= magnitude);
        }
        self
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> Result<f32> {
        cosine_similarity(&self.0, &other.0)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// `dot(a, b) / (|a| * |b|)`, clamped to `[-1, 1]`.
///
/// Fails with [`Error::DegenerateVector`] when either vector has zero
/// magnitude and with [`Error::InvalidInput`] when the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::InvalidInput(format!(
            "Embedding dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return Err(Error::DegenerateVector);
    }
    Ok((dot / (na * nb)).clamp(-1.0, 1.0))
}
