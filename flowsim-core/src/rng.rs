//! The single seeded PRNG threaded through a run. Every random draw in the
//! crate — time-model sampling, routing heuristics, Petri-net transition
//! choice — goes through a `SimRng` obtained from the owning
//! [`crate::world::World`]. Nothing may call `rand::thread_rng()`; that is
//! what makes two runs with the same seed produce byte-identical event logs
//! (spec §5, §8 property 4).

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug)]
pub struct SimRng {
    rng: StdRng,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn inner(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform draw in `[0, 1)`, used by the routing heuristics and
    /// Petri-net transition selection.
    pub fn uniform(&mut self) -> f64 {
        use rand::Rng;
        self.rng.gen::<f64>()
    }

    /// Uniform pick of one index in `0..len`. Panics on `len == 0`; callers
    /// are expected to have already excluded the empty-candidate-set case.
    pub fn pick_index(&mut self, len: usize) -> usize {
        use rand::Rng;
        self.rng.gen_range(0..len)
    }
}
