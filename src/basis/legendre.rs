//! Legendre polynomials and the per-cell orthonormal basis.

use fenris_quadrature::univariate;

/// Values and derivatives of `P_0 .. P_{n-1}` at `x`.
///
/// Uses the three-term recurrence `m P_m = (2m - 1) x P_{m-1} - (m - 1) P_{m-2}`
/// and `P'_m = P'_{m-2} + (2m - 1) P_{m-1}`, both valid on the closed interval.
pub fn legendre(n: usize, x: f64) -> (Vec<f64>, Vec<f64>) {
    let mut p = vec![0.0; n];
    let mut dp = vec![0.0; n];
    for m in 0..n {
        match m {
            0 => p[0] = 1.0,
            1 => {
                p[1] = x;
                dp[1] = 1.0;
            }
            _ => {
                let mf = m as f64;
                p[m] = ((2.0 * mf - 1.0) * x * p[m - 1] - (mf - 1.0) * p[m - 2]) / mf;
                dp[m] = dp[m - 2] + (2.0 * mf - 1.0) * p[m - 1];
            }
        }
    }
    (p, dp)
}

/// Gauss–Legendre rule on `[-1, 1]` as `(weights, points)`.
pub fn gauss(num_points: usize) -> (Vec<f64>, Vec<f64>) {
    let (weights, points) = univariate::gauss(num_points);
    (weights, points.into_iter().map(|[x]| x).collect())
}

/// Quadrature order used for coefficient and projection integrals.
pub fn quadrature_points(degree: usize) -> usize {
    (degree + 1).max(10)
}

/// Orthonormal Legendre basis on the reference cell, tabulated at Gauss points.
///
/// On a physical cell of width `h` the basis is `φ_p(x) = ψ_p(ξ) / √h` with
/// `ψ_p = √(2p+1) P_p`, so that `∫ φ_p φ_q dx = δ_pq`.
#[derive(Debug, Clone)]
pub struct CellBasis {
    pub degree: usize,
    pub weights: Vec<f64>,
    pub points: Vec<f64>,
    /// `values[q][p] = ψ_p(ξ_q)`
    pub values: Vec<Vec<f64>>,
    /// `derivatives[q][p] = ψ_p'(ξ_q)`
    pub derivatives: Vec<Vec<f64>>,
    /// `ψ_p(-1)`
    pub left: Vec<f64>,
    /// `ψ_p(1)`
    pub right: Vec<f64>,
}

impl CellBasis {
    pub fn new(degree: usize) -> Self {
        let (weights, points) = gauss(quadrature_points(degree));
        let scale: Vec<f64> = (0..degree).map(|p| ((2 * p + 1) as f64).sqrt()).collect();
        let tabulate = |x: f64| {
            let (p, dp) = legendre(degree, x);
            let v = p.iter().zip(&scale).map(|(a, s)| a * s).collect::<Vec<_>>();
            let d = dp.iter().zip(&scale).map(|(a, s)| a * s).collect::<Vec<_>>();
            (v, d)
        };
        let (values, derivatives): (Vec<Vec<f64>>, Vec<Vec<f64>>) =
            points.iter().map(|&x| tabulate(x)).unzip();
        let left = tabulate(-1.0).0;
        let right = tabulate(1.0).0;
        Self { degree, weights, points, values, derivatives, left, right }
    }

    /// Physical position of reference point `xi` in the cell `[a, a + h]`.
    pub fn map(a: f64, h: f64, xi: f64) -> f64 {
        a + 0.5 * h * (xi + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn legendre_matches_closed_forms() {
        for &x in &[-1.0, -0.3, 0.0, 0.45, 1.0] {
            let (p, dp) = legendre(4, x);
            assert_abs_diff_eq!(p[2], 0.5 * (3.0 * x * x - 1.0), epsilon = 1e-14);
            assert_abs_diff_eq!(p[3], 0.5 * (5.0 * x * x * x - 3.0 * x), epsilon = 1e-14);
            assert_abs_diff_eq!(dp[2], 3.0 * x, epsilon = 1e-14);
            assert_abs_diff_eq!(dp[3], 0.5 * (15.0 * x * x - 3.0), epsilon = 1e-14);
        }
    }

    #[test]
    fn reference_basis_is_orthonormal() {
        let basis = CellBasis::new(4);
        for p in 0..4 {
            for q in 0..4 {
                let ip: f64 = basis
                    .weights
                    .iter()
                    .zip(&basis.values)
                    .map(|(w, v)| 0.5 * w * v[p] * v[q])
                    .sum();
                let expected = if p == q { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(ip, expected, epsilon = 1e-12);
            }
        }
    }
}
