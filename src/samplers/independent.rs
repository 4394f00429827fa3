use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::vec::Vec2;

use super::Sampler;

pub struct Independent {
    rnd: ChaCha8Rng,
}

impl Sampler for Independent {
    fn next(&mut self) -> f64 {
        self.rnd.random()
    }

    fn next2d(&mut self) -> Vec2 {
        Vec2::new(self.rnd.random(), self.rnd.random())
    }

    fn clone_box(&mut self) -> Box<dyn Sampler> {
        Box::new(Self {
            rnd: ChaCha8Rng::seed_from_u64(self.rnd.random()),
        })
    }
}

impl Independent {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rnd: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Default for Independent {
    fn default() -> Self {
        Self::new(0)
    }
}
