//! Scalar uint8 quantization for stored vectors.
//!
//! Each vector is mapped to bytes with a per-vector `(scale, offset)`
//! pair. Reconstruction error is observable through
//! [`QuantizedVector::max_reconstruction_error`] but correctness of the
//! engine never depends on it.

use serde::{Deserialize, Serialize};

/// A u8-quantized vector with its dequantization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedVector {
    pub data: Vec<u8>,
    pub scale: f32,
    pub offset: f32,
}

impl QuantizedVector {
    /// Quantize a float vector. A constant vector gets scale 0 and
    /// dequantizes exactly.
    #[must_use]
    pub fn quantize(v: &[f32]) -> Self {
        let min = v.iter().copied().fold(f32::INFINITY, f32::min);
        let max = v.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if v.is_empty() || !min.is_finite() || !max.is_finite() {
            return Self {
                data: Vec::new(),
                scale: 0.0,
                offset: 0.0,
            };
        }
        let scale = (max - min) / 255.0;
        let data = if scale == 0.0 {
            vec![0u8; v.len()]
        } else {
            v.iter()
                .map(|x| (((x - min) / scale).round().clamp(0.0, 255.0)) as u8)
                .collect()
        };
        Self {
            data,
            scale,
            offset: min,
        }
    }

    /// Reconstruct the float vector.
    #[must_use]
    pub fn dequantize(&self) -> Vec<f32> {
        self.data
            .iter()
            .map(|b| f32::from(*b) * self.scale + self.offset)
            .collect()
    }

    /// Largest absolute elementwise error against the original.
    #[must_use]
    pub fn max_reconstruction_error(&self, original: &[f32]) -> f32 {
        self.dequantize()
            .iter()
            .zip(original.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_error_is_bounded_by_scale() {
        let v: Vec<f32> = (0..384).map(|i| (i as f32 * 0.37).sin()).collect();
        let q = QuantizedVector::quantize(&v);
        assert_eq!(q.data.len(), v.len());
        // Worst case is half a quantization step.
        assert!(q.max_reconstruction_error(&v) <= q.scale * 0.5 + 1e-6);
    }

    #[test]
    fn constant_vector_reconstructs_exactly() {
        let v = vec![0.25f32; 16];
        let q = QuantizedVector::quantize(&v);
        assert_eq!(q.scale, 0.0);
        assert_eq!(q.dequantize(), v);
    }

    #[test]
    fn empty_vector_quantizes_empty() {
        let q = QuantizedVector::quantize(&[]);
        assert!(q.data.is_empty());
        assert!(q.dequantize().is_empty());
    }
}
