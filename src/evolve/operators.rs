//! Bounded variation operators over integer index vectors.
//!
//! Simulated binary crossover and polynomial mutation run in continuous
//! space, then round and clamp every gene into `[low, up]`.

use rand::Rng;

use crate::design::ParamSpace;

/// Inclusive per-parameter index bounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub low: Vec<usize>,
    pub up: Vec<usize>,
}

impl Bounds {
    /// `[0, len - 1]` for every parameter of the space.
    pub fn from_space(space: &ParamSpace) -> Self {
        let up: Vec<usize> = space.lens().iter().map(|&n| n.saturating_sub(1)).collect();
        Self {
            low: vec![0; up.len()],
            up,
        }
    }

    pub fn dims(&self) -> usize {
        self.low.len()
    }

    pub fn contains(&self, genes: &[usize]) -> bool {
        genes.len() == self.dims()
            && genes
                .iter()
                .zip(self.low.iter().zip(&self.up))
                .all(|(&g, (&lo, &hi))| lo <= g && g <= hi)
    }

    fn clamp(&self, i: usize, x: f64) -> usize {
        let lo = self.low[i] as f64;
        let hi = self.up[i] as f64;
        x.round().clamp(lo, hi) as usize
    }
}

/// Bounded simulated binary crossover. Each gene crosses with
/// probability 0.5; `eta` controls how close children stay to parents.
pub fn sbx_crossover<R: Rng + ?Sized>(
    a: &[usize],
    b: &[usize],
    eta: f64,
    bounds: &Bounds,
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let mut c1 = a.to_vec();
    let mut c2 = b.to_vec();
    let exp = 1.0 / (eta + 1.0);

    for i in 0..a.len().min(b.len()).min(bounds.dims()) {
        if rng.gen::<f64>() > 0.5 || a[i] == b[i] {
            continue;
        }
        let xl = bounds.low[i] as f64;
        let xu = bounds.up[i] as f64;
        let x1 = a[i].min(b[i]) as f64;
        let x2 = a[i].max(b[i]) as f64;
        let u: f64 = rng.gen();

        let spread = |beta: f64| -> f64 {
            let alpha = 2.0 - beta.powf(-(eta + 1.0));
            if u <= 1.0 / alpha {
                (u * alpha).powf(exp)
            } else {
                (1.0 / (2.0 - u * alpha)).powf(exp)
            }
        };

        let beta_q = spread(1.0 + 2.0 * (x1 - xl) / (x2 - x1));
        let low_child = 0.5 * (x1 + x2 - beta_q * (x2 - x1));
        let beta_q = spread(1.0 + 2.0 * (xu - x2) / (x2 - x1));
        let high_child = 0.5 * (x1 + x2 + beta_q * (x2 - x1));

        let (g1, g2) = if rng.gen::<f64>() <= 0.5 {
            (high_child, low_child)
        } else {
            (low_child, high_child)
        };
        c1[i] = bounds.clamp(i, g1);
        c2[i] = bounds.clamp(i, g2);
    }
    (c1, c2)
}

/// Bounded polynomial mutation with per-gene probability `indpb`.
///
/// Rounding can cancel small perturbations; if no gene moved, one random
/// gene with a non-degenerate range steps by one index.
pub fn polynomial_mutation<R: Rng + ?Sized>(
    genes: &[usize],
    eta: f64,
    indpb: f64,
    bounds: &Bounds,
    rng: &mut R,
) -> Vec<usize> {
    let mut child = genes.to_vec();
    let exp = 1.0 / (eta + 1.0);

    for i in 0..child.len().min(bounds.dims()) {
        if rng.gen::<f64>() > indpb || bounds.up[i] <= bounds.low[i] {
            continue;
        }
        let xl = bounds.low[i] as f64;
        let xu = bounds.up[i] as f64;
        let x = child[i] as f64;
        let d1 = (x - xl) / (xu - xl);
        let d2 = (xu - x) / (xu - xl);
        let u: f64 = rng.gen();

        let delta_q = if u < 0.5 {
            let val = 2.0 * u + (1.0 - 2.0 * u) * (1.0 - d1).powf(eta + 1.0);
            val.powf(exp) - 1.0
        } else {
            let val = 2.0 * (1.0 - u) + 2.0 * (u - 0.5) * (1.0 - d2).powf(eta + 1.0);
            1.0 - val.powf(exp)
        };
        child[i] = bounds.clamp(i, x + delta_q * (xu - xl));
    }

    if child == genes {
        step_one_gene(&mut child, bounds, rng);
    }
    child
}

fn step_one_gene<R: Rng + ?Sized>(genes: &mut [usize], bounds: &Bounds, rng: &mut R) {
    let movable: Vec<usize> = (0..genes.len().min(bounds.dims()))
        .filter(|&i| bounds.up[i] > bounds.low[i])
        .collect();
    if movable.is_empty() {
        return;
    }
    let i = movable[rng.gen_range(0..movable.len())];
    let up = genes[i] < bounds.up[i] && (genes[i] == bounds.low[i] || rng.gen_bool(0.5));
    if up {
        genes[i] += 1;
    } else {
        genes[i] -= 1;
    }
}
