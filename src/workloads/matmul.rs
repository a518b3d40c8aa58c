//! Dense square matrix multiply, naive loop vs rayon row-parallel.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::{check_eq, CheckError, Variant, Workload};

/// Row-major `n × n` matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Square {
    pub n: usize,
    pub data: Vec<f64>,
}

impl Square {
    pub fn from_rows<const N: usize>(rows: [[f64; N]; N]) -> Self {
        Self {
            n: N,
            data: rows.iter().flatten().copied().collect(),
        }
    }

    fn random(n: usize, rng: &mut ChaCha8Rng) -> Self {
        Self {
            n,
            data: (0..n * n).map(|_| rng.gen_range(0.0..1.0)).collect(),
        }
    }
}

pub type Pair = (Square, Square);

pub fn matmul_native((a, b): &Pair) -> Square {
    let n = a.n;
    let mut c = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                c[i * n + j] += a.data[i * n + k] * b.data[k * n + j];
            }
        }
    }
    Square { n, data: c }
}

/// Row-parallel i-k-j multiply; each output element sums over `k` in the same
/// order as [`matmul_native`], so results are bit-identical.
pub fn matmul_par((a, b): &Pair) -> Square {
    let n = a.n;
    let mut c = vec![0.0; n * n];
    if n == 0 {
        return Square { n, data: c };
    }
    c.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for k in 0..n {
            let aik = a.data[i * n + k];
            let b_row = &b.data[k * n..(k + 1) * n];
            for (out, bkj) in row.iter_mut().zip(b_row) {
                *out += aik * bkj;
            }
        }
    });
    Square { n, data: c }
}

pub struct Matmul;

impl Workload for Matmul {
    type Input = Pair;
    type Output = Square;

    fn name(&self) -> &'static str {
        "matmul"
    }

    fn initialize(&self, size: usize, rng: &mut ChaCha8Rng) -> Pair {
        let a = Square::random(size, rng);
        let b = Square::random(size, rng);
        (a, b)
    }

    fn test(&self) -> Result<(), CheckError> {
        let pair = (
            Square::from_rows([[1.0, 2.0], [3.0, 4.0]]),
            Square::from_rows([[5.0, 6.0], [7.0, 8.0]]),
        );
        let want = Square::from_rows([[19.0, 22.0], [43.0, 50.0]]);
        check_eq("matmul_native 2x2", matmul_native(&pair), want.clone())?;
        check_eq("matmul_par 2x2", matmul_par(&pair), want)
    }

    fn variants(&self) -> Vec<Variant<Pair, Square>> {
        vec![
            Variant {
                name: "matmul_native",
                run: matmul_native,
            },
            Variant {
                name: "matmul_par",
                run: matmul_par,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::DriverConfig;

    #[test]
    fn test_known_product() {
        Matmul.test().unwrap();
    }

    #[test]
    fn test_variants_agree_on_fixture() {
        let pair = Matmul.initialize(17, &mut DriverConfig::default().rng());
        assert_eq!(pair.0.data.len(), 17 * 17);
        assert_eq!(matmul_native(&pair), matmul_par(&pair));
    }

    #[test]
    fn test_identity() {
        let m = Square::from_rows([[2.0, 0.5, 1.0], [0.0, 3.0, 4.0], [1.0, 1.0, 1.0]]);
        let id = Square::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(matmul_par(&(m.clone(), id)), m);
    }

    #[test]
    fn test_empty() {
        let pair = Matmul.initialize(0, &mut DriverConfig::default().rng());
        assert!(matmul_par(&pair).data.is_empty());
    }
}
