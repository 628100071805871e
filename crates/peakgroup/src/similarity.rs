//! Spectral similarity and correlation primitives.
//!
//! All functions are pure, and accumulate in f64 regardless of input precision.

use crate::spectrum::Peak;

fn norm(points: &[Peak]) -> f64 {
    points
        .iter()
        .fold(0.0, |acc, peak| acc + (peak.intensity as f64).powi(2))
        .sqrt()
}

/// Scale intensities to unit L2 norm. An all-zero input stays all-zero.
pub fn normalize_l2(points: &[Peak]) -> Vec<Peak> {
    let norm = norm(points);
    points
        .iter()
        .map(|peak| Peak {
            mz: peak.mz,
            intensity: match norm > 0.0 {
                true => (peak.intensity as f64 / norm) as f32,
                false => 0.0,
            },
        })
        .collect()
}

fn dot(a: &[Peak], b: &[Peak]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        if a[i].mz < b[j].mz {
            i += 1;
        } else if a[i].mz > b[j].mz {
            j += 1;
        } else {
            dot += a[i].intensity as f64 * b[j].intensity as f64;
            i += 1;
            j += 1;
        }
    }
    dot
}

/// Merge-join dot product of two m/z-sorted peak lists. Only peaks with
/// exactly equal m/z contribute, so both inputs should be binned onto the same
/// grid first (see [`crate::binning::bin`])
pub fn dot_product(a: &[Peak], b: &[Peak]) -> f32 {
    dot(a, b) as f32
}

/// Cosine similarity of two binned, m/z-sorted peak lists
pub fn cosine(a: &[Peak], b: &[Peak]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 0.0;
    }
    (dot(a, b) / denom) as f32
}

/// Pearson correlation of paired measurements, rescaled from `[-1, 1]` onto
/// `[0, 1]`. Returns 0 for fewer than two points, or if either side has no
/// variance.
pub fn pearson_like(points: &[(f32, f32)]) -> f32 {
    if points.len() <= 1 {
        return 0.0;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|&(x, _)| x as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|&(_, y)| y as f64).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for &(x, y) in points {
        let dx = x as f64 - mean_x;
        let dy = y as f64 - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    let r = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);
    (0.5 * (1.0 + r)) as f32
}

/// Normalized spectral contrast angle of paired intensities: 1 for
/// proportional vectors, 0 for orthogonal ones. Returns 0 for fewer than two
/// points, or if either side is all zeros.
pub fn contrast_angle(points: &[(f32, f32)]) -> f32 {
    if points.len() <= 1 {
        return 0.0;
    }
    let (mut dot, mut xx, mut yy) = (0.0f64, 0.0f64, 0.0f64);
    for &(x, y) in points {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        xx += x * x;
        yy += y * y;
    }
    if xx == 0.0 || yy == 0.0 {
        return 0.0;
    }
    let similarity = (dot / (xx.sqrt() * yy.sqrt())).clamp(0.0, 1.0);
    (1.0 - 2.0 * similarity.acos() / std::f64::consts::PI) as f32
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn grid(data: Vec<(u8, u16)>) -> Vec<Peak> {
        let mut peaks = data
            .into_iter()
            .map(|(bin, intensity)| Peak {
                mz: bin as f64,
                intensity: intensity as f32,
            })
            .collect::<Vec<_>>();
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        peaks.dedup_by(|a, b| a.mz == b.mz);
        peaks
    }

    fn paired(data: Vec<(u16, u16)>) -> Vec<(f32, f32)> {
        data.into_iter()
            .map(|(x, y)| (x as f32, y as f32))
            .collect()
    }

    #[quickcheck]
    fn dot_product_is_symmetric(a: Vec<(u8, u16)>, b: Vec<(u8, u16)>) -> bool {
        let (a, b) = (grid(a), grid(b));
        dot_product(&a, &b) == dot_product(&b, &a)
    }

    #[quickcheck]
    fn scores_within_unit_interval(data: Vec<(u16, u16)>) -> bool {
        let points = paired(data);
        let p = pearson_like(&points);
        let c = contrast_angle(&points);
        (0.0..=1.0).contains(&p) && (0.0..=1.0).contains(&c)
    }

    #[quickcheck]
    fn normalized_self_dot_is_one(data: Vec<(u8, u16)>) -> bool {
        let peaks = normalize_l2(&grid(data));
        let self_dot = dot_product(&peaks, &peaks);
        match peaks.iter().any(|peak| peak.intensity > 0.0) {
            true => (self_dot - 1.0).abs() < 1e-4,
            false => self_dot == 0.0,
        }
    }

    #[test]
    fn normalize_zero() {
        let peaks = vec![
            Peak {
                mz: 1.0,
                intensity: 0.0,
            };
            3
        ];
        assert!(normalize_l2(&peaks).iter().all(|p| p.intensity == 0.0));
        assert!(normalize_l2(&[]).is_empty());
    }

    #[test]
    fn dot_product_exact_match_only() {
        let a = grid(vec![(1, 2), (2, 3), (4, 5)]);
        let b = grid(vec![(2, 10), (3, 100), (4, 1)]);
        assert_eq!(dot_product(&a, &b), 35.0);
        assert_eq!(dot_product(&a, &[]), 0.0);
        assert_eq!(dot_product(&[], &b), 0.0);
    }

    #[test]
    fn cosine_similarity() {
        let a = grid(vec![(1, 3), (2, 4)]);
        let b = grid(vec![(1, 6), (2, 8)]);
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-6);
        let c = grid(vec![(3, 6), (4, 8)]);
        assert_eq!(cosine(&a, &c), 0.0);
        assert_eq!(cosine(&a, &[]), 0.0);
    }

    #[test]
    fn pearson() {
        assert_eq!(pearson_like(&[]), 0.0);
        assert_eq!(pearson_like(&[(1.0, 2.0)]), 0.0);
        let up = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        assert!((pearson_like(&up) - 1.0).abs() < 1e-6);
        let down = [(1.0, 6.0), (2.0, 4.0), (3.0, 2.0)];
        assert!(pearson_like(&down).abs() < 1e-6);
        let flat = [(1.0, 1.0), (2.0, 1.0), (3.0, 1.0)];
        assert_eq!(pearson_like(&flat), 0.0);
    }

    #[test]
    fn contrast() {
        assert_eq!(contrast_angle(&[(1.0, 1.0)]), 0.0);
        let proportional = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        assert!((contrast_angle(&proportional) - 1.0).abs() < 1e-6);
        let orthogonal = [(1.0, 0.0), (0.0, 1.0)];
        assert!(contrast_angle(&orthogonal).abs() < 1e-6);
        // 45 degrees -> 0.5
        let diagonal = [(1.0, 1.0), (0.0, 1.0)];
        assert!((contrast_angle(&diagonal) - 0.5).abs() < 1e-6);
        assert_eq!(contrast_angle(&[(0.0, 1.0), (0.0, 2.0)]), 0.0);
    }
}
