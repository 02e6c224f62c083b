//! Shared helpers for tang benchmarks: seeded RNG, formula generators.

use tang_term::{Result, TermBuilder, TermId};

/// Simple xoshiro256** PRNG for reproducible benchmarks (no rand dependency in lib).
pub struct Rng {
    s: [u64; 4],
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        // SplitMix64 to expand seed into state
        let mut z = seed;
        let mut s = [0u64; 4];
        for slot in &mut s {
            z = z.wrapping_add(0x9e3779b97f4a7c15);
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
            *slot = z ^ (z >> 31);
        }
        Self { s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.s[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    /// Uniform f64 in [-1, 1]
    pub fn f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64) * 2.0 - 1.0
    }

    /// Uniform index in `0..n`.
    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

pub fn make_rng() -> Rng {
    Rng::new(0xDEAD_BEEF_CAFE_BABE)
}

/// `n` input vectors of length `vars`, each component in [-scale, scale].
pub fn random_points(n: usize, vars: usize, scale: f64) -> Vec<Vec<f64>> {
    let mut rng = make_rng();
    (0..n)
        .map(|_| (0..vars).map(|_| rng.f64() * scale).collect())
        .collect()
}

/// A solver-style formula over `n` points in the plane: every point must stay
/// inside the unit box, consecutive points must stay close, and the sum of
/// squared distances to the origin is the utility.
///
/// Returns the builder and the top term. The formula has `2 * n` variables.
pub fn build_point_layout(n: usize) -> Result<(TermBuilder, TermId)> {
    let mut b = TermBuilder::new();
    let points: Vec<[TermId; 2]> = (0..n)
        .map(|_| [b.create_variable(), b.create_variable()])
        .collect();
    let lower = [b.constant(-1.0), b.constant(-1.0)];
    let upper = [b.constant(1.0), b.constant(1.0)];
    let origin = [b.zero(), b.zero()];

    let mut constraint = b.true_term();
    let mut utility = b.zero();
    for (i, p) in points.iter().enumerate() {
        let inside = b.bounded_rectangle(*p, lower, upper, 0.01);
        constraint = b.conjoin(constraint, inside);
        if i > 0 {
            let gap = b.euclidean_distance_sqr(&points[i - 1], p)?;
            let close = b.lt(gap, 0.25);
            constraint = b.conjoin(constraint, close);
        }
        let d = b.euclidean_distance_sqr(p, &origin)?;
        utility = b.add(utility, d);
    }
    let top = b.constraint_utility(constraint, utility);
    Ok((b, top))
}

/// A random arithmetic chain of `len` operations over `vars` variables.
pub fn build_random_chain(len: usize, vars: usize) -> (TermBuilder, TermId) {
    let mut rng = make_rng();
    let mut b = TermBuilder::new();
    let xs: Vec<TermId> = (0..vars).map(|_| b.create_variable()).collect();
    let mut acc = xs[0];
    for _ in 0..len {
        let x = xs[rng.below(vars)];
        acc = match rng.below(6) {
            0 => b.add(acc, x),
            1 => b.mul(acc, x),
            2 => {
                let s = b.sin(x);
                b.add(acc, s)
            }
            3 => {
                let c = b.constant(rng.f64());
                b.mul(acc, c)
            }
            4 => b.sigmoid(acc, 2.0),
            _ => {
                let e = b.const_power(x, 2.0);
                b.sub(acc, e)
            }
        };
    }
    (b, acc)
}
