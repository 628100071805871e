use std::ops::Mul;

pub const PROTON: f64 = 1.007276466;
pub const NEUTRON: f64 = 1.00335;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Tolerance {
    Ppm(f64, f64),
}

impl Tolerance {
    /// Symmetric ppm window, e.g. `Tolerance::symmetric_ppm(10.0)` is `Ppm(-10.0, 10.0)`
    pub fn symmetric_ppm(ppm: f64) -> Self {
        Tolerance::Ppm(-ppm.abs(), ppm.abs())
    }

    /// Compute the (`lower`, `upper`) window (in m/z units) around `center`
    pub fn bounds(&self, center: f64) -> (f64, f64) {
        match self {
            Tolerance::Ppm(lo, hi) => {
                let delta_lo = center * lo / 1_000_000.0;
                let delta_hi = center * hi / 1_000_000.0;
                (center + delta_lo, center + delta_hi)
            }
        }
    }

    /// Largest absolute ppm error allowed by this window
    pub fn max_ppm(&self) -> f64 {
        match self {
            Tolerance::Ppm(lo, hi) => lo.abs().max(hi.abs()),
        }
    }
}

impl Mul<f64> for Tolerance {
    type Output = Tolerance;

    fn mul(self, rhs: f64) -> Self::Output {
        match self {
            Tolerance::Ppm(lo, hi) => Tolerance::Ppm(lo * rhs, hi * rhs),
        }
    }
}

/// Absolute mass error of `observed` relative to `reference`, in parts-per-million
pub fn ppm_error(observed: f64, reference: f64) -> f64 {
    (observed - reference).abs() / reference * 1_000_000.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ppm_bounds() {
        let tol = Tolerance::symmetric_ppm(10.0);
        let (lo, hi) = tol.bounds(1000.0);
        assert!((lo - 999.99).abs() < 1e-9);
        assert!((hi - 1000.01).abs() < 1e-9);
        assert_eq!(Tolerance::symmetric_ppm(-7.5).max_ppm(), 7.5);
    }

    #[test]
    fn widened_tolerance() {
        let tol = Tolerance::symmetric_ppm(10.0) * 1.5;
        assert_eq!(tol, Tolerance::Ppm(-15.0, 15.0));
        assert_eq!(tol.max_ppm(), 15.0);
    }

    #[test]
    fn ppm_error_is_relative_to_reference() {
        assert_eq!(ppm_error(1024.015625, 1024.0), 15.2587890625);
        assert_eq!(ppm_error(1024.0, 1024.0), 0.0);
    }
}
