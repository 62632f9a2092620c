//! Parent selection policies.

use rand::{Rng, RngCore};

use crate::design::Design;

/// Chooses parents from a population.
pub trait SelectionPolicy {
    /// Index of one selected parent. `population` is never empty.
    fn select(&self, population: &[Design], rng: &mut dyn RngCore) -> usize;

    /// Two parent indices, distinct when the population allows it.
    fn select_pair(&self, population: &[Design], rng: &mut dyn RngCore) -> (usize, usize) {
        let a = self.select(population, rng);
        if population.len() < 2 {
            return (a, a);
        }
        for _ in 0..8 {
            let b = self.select(population, rng);
            if b != a {
                return (a, b);
            }
        }
        // Strong selection pressure kept returning `a`; take any other member.
        let offset = rng.gen_range(1..population.len());
        (a, (a + offset) % population.len())
    }
}

/// Best of `size` uniformly drawn contestants. Unevaluated designs lose.
#[derive(Clone, Copy, Debug)]
pub struct Tournament {
    pub size: usize,
}

impl Tournament {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }
}

impl SelectionPolicy for Tournament {
    fn select(&self, population: &[Design], rng: &mut dyn RngCore) -> usize {
        let mut best = rng.gen_range(0..population.len());
        for _ in 1..self.size {
            let challenger = rng.gen_range(0..population.len());
            let challenger_fit = population[challenger].fitness().unwrap_or(f64::NEG_INFINITY);
            let best_fit = population[best].fitness().unwrap_or(f64::NEG_INFINITY);
            if challenger_fit > best_fit {
                best = challenger;
            }
        }
        best
    }
}

/// Uniform pick, ignoring fitness.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomPick;

impl SelectionPolicy for RandomPick {
    fn select(&self, population: &[Design], rng: &mut dyn RngCore) -> usize {
        rng.gen_range(0..population.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn population(costs: &[f64]) -> Vec<Design> {
        costs
            .iter()
            .enumerate()
            .map(|(i, &c)| Design::evaluated(vec![i], c))
            .collect()
    }

    #[test]
    fn tournament_prefers_low_cost() {
        let pop = population(&[5.0, 4.0, 3.0, 2.0, 1.0, 0.0]);
        let policy = Tournament::new(3);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut wins = [0usize; 6];
        for _ in 0..3000 {
            wins[policy.select(&pop, &mut rng)] += 1;
        }
        assert!(wins[5] > wins[0] * 5, "{:?}", wins);
    }

    #[test]
    fn pair_is_distinct() {
        let pop = population(&[1.0, 0.0]);
        // Size 50 almost always picks index 1; the fallback must still differ.
        let policy = Tournament::new(50);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..200 {
            let (a, b) = policy.select_pair(&pop, &mut rng);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn single_member_pairs_with_itself() {
        let pop = population(&[1.0]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(RandomPick.select_pair(&pop, &mut rng), (0, 0));
    }
}
