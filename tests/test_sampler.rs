use approx::assert_abs_diff_eq;
use glm_rust::{Distribution, Poisson, PoissonSampler};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const DRAWS: usize = 100_000;

fn empirical_pmf(draws: &[u64], upto: usize) -> Vec<f64> {
    let mut counts = vec![0usize; upto + 1];
    for &d in draws {
        if (d as usize) <= upto {
            counts[d as usize] += 1;
        }
    }
    counts
        .into_iter()
        .map(|c| c as f64 / draws.len() as f64)
        .collect()
}

#[test]
fn test_poisson_five_matches_distribution() {
    let poisson = Poisson::new(5.0).unwrap();
    let draws: Vec<u64> = poisson
        .sampler(ChaCha8Rng::seed_from_u64(42))
        .take(DRAWS)
        .collect();

    let mean = draws.iter().sum::<u64>() as f64 / DRAWS as f64;
    // Standard error √(5/100000) ≈ 0.007
    assert_abs_diff_eq!(mean, 5.0, epsilon = 0.04);

    let pmf = empirical_pmf(&draws, 15);
    for (k, observed) in pmf.iter().enumerate() {
        let expected = poisson.probability(k as f64).unwrap();
        // Binomial standard error is at most √(0.25/100000) ≈ 0.0016
        assert_abs_diff_eq!(*observed, expected, epsilon = 0.008);
    }
}

#[test]
fn test_rejection_sampler_matches_distribution() {
    let poisson = Poisson::new(40.0).unwrap();
    let draws: Vec<u64> = PoissonSampler::new(40.0, ChaCha8Rng::seed_from_u64(3))
        .unwrap()
        .take(DRAWS)
        .collect();

    let mean = draws.iter().sum::<u64>() as f64 / DRAWS as f64;
    assert_abs_diff_eq!(mean, 40.0, epsilon = 0.1);

    let pmf = empirical_pmf(&draws, 60);
    for k in 25..=55 {
        let expected = poisson.probability(k as f64).unwrap();
        assert_abs_diff_eq!(pmf[k], expected, epsilon = 0.004);
    }
}

#[test]
fn test_sampler_is_an_iterator() {
    let mut sampler = PoissonSampler::new(0.5, ChaCha8Rng::seed_from_u64(0)).unwrap();
    assert!(sampler.next().is_some());
    assert_eq!(sampler.by_ref().take(10).count(), 10);
    assert_eq!(sampler.mean(), 0.5);
}
