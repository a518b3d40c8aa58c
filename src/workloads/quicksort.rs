//! Lomuto quicksort on a fresh copy of random bytes, vs the std unstable sort.

use rand_chacha::rand_core::RngCore;
use rand_chacha::ChaCha8Rng;

use super::{check_eq, CheckError, Variant, Workload};

/// In-place quicksort with the last element as pivot.
///
/// Recurses into the smaller partition and loops on the larger one, so stack
/// depth stays logarithmic.
pub fn quicksort<T: PartialOrd + Copy>(data: &mut [T]) {
    let mut slice = data;
    while slice.len() > 1 {
        let p = partition(slice);
        let (left, right) = std::mem::take(&mut slice).split_at_mut(p);
        let right = &mut right[1..];
        if left.len() < right.len() {
            quicksort(left);
            slice = right;
        } else {
            quicksort(right);
            slice = left;
        }
    }
}

fn partition<T: PartialOrd + Copy>(data: &mut [T]) -> usize {
    let last = data.len() - 1;
    let pivot = data[last];
    let mut i = 0;
    for j in 0..last {
        if data[j] <= pivot {
            data.swap(i, j);
            i += 1;
        }
    }
    data.swap(i, last);
    i
}

fn bench_quicksort(data: &Vec<u8>) -> Vec<u8> {
    let mut copy = data.clone();
    quicksort(&mut copy);
    copy
}

fn bench_sort_unstable(data: &Vec<u8>) -> Vec<u8> {
    let mut copy = data.clone();
    copy.sort_unstable();
    copy
}

pub struct Quicksort;

impl Workload for Quicksort {
    type Input = Vec<u8>;
    type Output = Vec<u8>;

    fn name(&self) -> &'static str {
        "quicksort"
    }

    fn initialize(&self, size: usize, rng: &mut ChaCha8Rng) -> Vec<u8> {
        let mut data = vec![0u8; size];
        rng.fill_bytes(&mut data);
        data
    }

    fn test(&self) -> Result<(), CheckError> {
        let input = vec![4, 3, 2, 1];
        check_eq("quicksort([4,3,2,1])", bench_quicksort(&input), vec![1, 2, 3, 4])?;
        check_eq("sort_unstable([4,3,2,1])", bench_sort_unstable(&input), vec![1, 2, 3, 4])
    }

    fn variants(&self) -> Vec<Variant<Vec<u8>, Vec<u8>>> {
        vec![
            Variant {
                name: "quicksort",
                run: bench_quicksort,
            },
            Variant {
                name: "sort_unstable",
                run: bench_sort_unstable,
            },
        ]
    }
}
