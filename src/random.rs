use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The only two random operations the generator needs. Every core call takes
/// one of these explicitly so runs can be replayed from a seed.
pub trait RandomSource {
    /// Uniform float in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn pick_index(&mut self, len: usize) -> usize;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn next_unit(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn pick_index(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }
}

/// Uniform choice from a slice, `None` when it is empty.
pub fn pick<'a, T, R>(rng: &mut R, items: &'a [T]) -> Option<&'a T>
where
    R: RandomSource + ?Sized,
{
    if items.is_empty() {
        return None;
    }
    items.get(rng.pick_index(items.len()))
}

/// Build the generator's random source. Without a seed one is drawn from the
/// thread rng; the seed actually used is handed back so it can be shown.
pub fn seeded_rng(seed: Option<u64>) -> (ChaCha8Rng, u64) {
    let seed = seed.unwrap_or_else(|| rand::thread_rng().gen::<u64>());
    (ChaCha8Rng::seed_from_u64(seed), seed)
}

/// Replays fixed draws, cycling through each list. Tests use it to force a
/// particular template, pitch or density outcome.
#[cfg(test)]
pub struct ScriptedSource {
    units: Vec<f64>,
    indices: Vec<usize>,
    unit_cursor: usize,
    index_cursor: usize,
}

#[cfg(test)]
impl ScriptedSource {
    pub fn new(units: Vec<f64>, indices: Vec<usize>) -> Self {
        ScriptedSource {
            units,
            indices,
            unit_cursor: 0,
            index_cursor: 0,
        }
    }
}

#[cfg(test)]
impl RandomSource for ScriptedSource {
    fn next_unit(&mut self) -> f64 {
        let value = self.units[self.unit_cursor % self.units.len()];
        self.unit_cursor += 1;
        value
    }

    fn pick_index(&mut self, len: usize) -> usize {
        let value = self.indices[self.index_cursor % self.indices.len()];
        self.index_cursor += 1;
        value % len
    }
}
