//! Vector geometry: cosine similarity, normalization, and the optional
//! Poincare-ball operations for hyperbolic mode.

/// L2 norm of a vector.
#[must_use]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Return an L2-normalized copy. A zero vector normalizes to itself.
#[must_use]
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Dot product; 0.0 on dimension mismatch.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity in [-1, 1].
///
/// For unit vectors this reduces to the dot product; for general inputs
/// the magnitudes are divided out. Mismatched dimensions or a zero
/// magnitude yield 0.0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let magnitude_a = l2_norm(a);
    let magnitude_b = l2_norm(b);
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (magnitude_a * magnitude_b)
}

/// Cosine distance: `1 - cosine_similarity`.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Poincare-ball distance with curvature `k` (the magnitude is used).
///
/// `(1/sqrt(K)) * acosh(1 + 2K * ||u-v||^2 / ((1-||u||^2)(1-||v||^2)))`.
/// Points on or outside the ball boundary make the denominator
/// non-positive; the distance degenerates to infinity there.
#[must_use]
pub fn poincare_distance(u: &[f32], v: &[f32], k: f64) -> f64 {
    let k = k.abs();
    if k == 0.0 || u.len() != v.len() {
        return f64::INFINITY;
    }
    let diff_sq: f64 = u
        .iter()
        .zip(v.iter())
        .map(|(a, b)| f64::from(a - b).powi(2))
        .sum();
    let norm_u_sq: f64 = u.iter().map(|x| f64::from(*x).powi(2)).sum();
    let norm_v_sq: f64 = v.iter().map(|x| f64::from(*x).powi(2)).sum();
    let denominator = (1.0 - norm_u_sq) * (1.0 - norm_v_sq);
    if denominator <= 0.0 {
        return f64::INFINITY;
    }
    let argument = 1.0 + 2.0 * k * diff_sq / denominator;
    argument.acosh() / k.sqrt()
}

/// Mobius addition on the Poincare ball with curvature `k`.
#[must_use]
pub fn mobius_add(u: &[f32], v: &[f32], k: f64) -> Vec<f32> {
    let k = k.abs() as f32;
    let uv = dot(u, v);
    let norm_u_sq = dot(u, u);
    let norm_v_sq = dot(v, v);
    let denominator = 1.0 + 2.0 * k * uv + k * k * norm_u_sq * norm_v_sq;
    if denominator == 0.0 {
        return vec![0.0; u.len()];
    }
    let coeff_u = 1.0 + 2.0 * k * uv + k * norm_v_sq;
    let coeff_v = 1.0 - k * norm_u_sq;
    u.iter()
        .zip(v.iter())
        .map(|(a, b)| (coeff_u * a + coeff_v * b) / denominator)
        .collect()
}

/// Exponential map from the tangent space at the origin into the ball:
/// `tanh(sqrt(K) ||v||) / (sqrt(K) ||v||) * v`.
#[must_use]
pub fn exp_map_origin(v: &[f32], k: f64) -> Vec<f32> {
    let k = k.abs() as f32;
    let norm = l2_norm(v);
    if norm == 0.0 || k == 0.0 {
        return v.to_vec();
    }
    let scaled = k.sqrt() * norm;
    let factor = scaled.tanh() / scaled;
    v.iter().map(|x| factor * x).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_norm() {
        let v = vec![3.0, 4.0];
        let n = l2_normalize(&v);
        assert!((l2_norm(&n) - 1.0).abs() < 1e-6);
        assert!((n[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector_is_identity() {
        let v = vec![0.0, 0.0, 0.0];
        assert_eq!(l2_normalize(&v), v);
    }

    #[test]
    fn cosine_similarity_range_and_symmetry() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-2.0, 0.5, 1.0];
        let ab = cosine_similarity(&a, &b);
        let ba = cosine_similarity(&b, &a);
        assert!((ab - ba).abs() < 1e-6);
        assert!((-1.0..=1.0).contains(&ab));
    }

    #[test]
    fn cosine_similarity_of_unit_vectors_is_dot() {
        let a = l2_normalize(&[1.0, 1.0, 0.0]);
        let b = l2_normalize(&[1.0, 0.0, 0.0]);
        assert!((cosine_similarity(&a, &b) - dot(&a, &b)).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_identical_is_zero() {
        let a = l2_normalize(&[0.2, 0.4, 0.9]);
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_yield_zero_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn poincare_distance_to_self_is_zero() {
        let u = vec![0.1, 0.2, 0.05];
        let d = poincare_distance(&u, &u, -1.0);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn poincare_distance_outside_ball_is_infinite() {
        let u = vec![1.5, 0.0];
        let v = vec![0.1, 0.1];
        assert!(poincare_distance(&u, &v, -1.0).is_infinite());
    }

    #[test]
    fn poincare_distance_grows_toward_boundary() {
        let origin = vec![0.0, 0.0];
        let near = vec![0.1, 0.0];
        let far = vec![0.9, 0.0];
        let d_near = poincare_distance(&origin, &near, -1.0);
        let d_far = poincare_distance(&origin, &far, -1.0);
        assert!(d_far > d_near);
    }

    #[test]
    fn mobius_add_with_origin_is_identity() {
        let u = vec![0.2, -0.1, 0.05];
        let zero = vec![0.0, 0.0, 0.0];
        let sum = mobius_add(&zero, &u, -1.0);
        for (a, b) in sum.iter().zip(u.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn exp_map_stays_inside_ball() {
        let v = vec![5.0, -3.0, 2.0];
        let mapped = exp_map_origin(&v, -1.0);
        assert!(l2_norm(&mapped) < 1.0);
    }
}
