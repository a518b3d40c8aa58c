//! Numerically stable softmax over random floats, scalar vs rayon.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::{check_close, CheckError, Variant, Workload};

pub fn softmax_native(x: &Vec<f64>) -> Vec<f64> {
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = x.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

pub fn softmax_par(x: &Vec<f64>) -> Vec<f64> {
    let max = x.par_iter().copied().reduce(|| f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = x.par_iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exp.par_iter().sum();
    exp.into_par_iter().map(|e| e / sum).collect()
}

pub struct Softmax;

impl Workload for Softmax {
    type Input = Vec<f64>;
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        "softmax"
    }

    fn initialize(&self, size: usize, rng: &mut ChaCha8Rng) -> Vec<f64> {
        (0..size).map(|_| rng.gen_range(0.0..1.0)).collect()
    }

    fn test(&self) -> Result<(), CheckError> {
        let x = vec![1.0, 2.0, 3.0];
        let want = [0.09003057317038046, 0.24472847105479764, 0.6652409557748219];
        check_close("softmax_native([1,2,3])", &softmax_native(&x), &want, 1e-12)?;
        check_close("softmax_par([1,2,3])", &softmax_par(&x), &want, 1e-12)?;

        let x = vec![1.0, 2.0, 3.0, 4.0];
        check_close(
            "softmax_par vs softmax_native",
            &softmax_par(&x),
            &softmax_native(&x),
            1e-9,
        )
    }

    fn variants(&self) -> Vec<Variant<Vec<f64>, Vec<f64>>> {
        vec![
            Variant {
                name: "softmax_native",
                run: softmax_native,
            },
            Variant {
                name: "softmax_par",
                run: softmax_par,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::DriverConfig;

    #[test]
    fn test_self_check() {
        Softmax.test().unwrap();
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let x = Softmax.initialize(2048, &mut DriverConfig::default().rng());
        let p = softmax_par(&x);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(p.iter().all(|&v| v > 0.0));
        check_close("fixture", &p, &softmax_native(&x), 1e-9).unwrap();
    }

    #[test]
    fn test_empty_input() {
        assert!(softmax_native(&Vec::new()).is_empty());
        assert!(softmax_par(&Vec::new()).is_empty());
    }
}
