use super::{VehicleFeed, LOG_TARGET};
use crate::simulation::SimulationCore;
use anyhow::{Result, anyhow};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};

/// Test feed that periodically perturbs every live vehicle's velocity and
/// upserts it back.
pub struct DummyFeed {
    interval: f32,
    jitter: Option<Uniform<f32>>,
    since_batch: f32,
    rng: StdRng,
}

impl DummyFeed {
    pub fn new(interval: f32, jitter: f32, seed: Option<u64>) -> Self {
        let rng = if let Some(seed) = seed {
            StdRng::seed_from_u64(seed)
        } else {
            StdRng::from_entropy()
        };

        Self {
            interval,
            jitter: (jitter > 0.0).then(|| Uniform::new_inclusive(-jitter, jitter)),
            since_batch: 0.0,
            rng,
        }
    }
}

impl VehicleFeed for DummyFeed {
    fn poll(&mut self, core: &SimulationCore, dt: f32) -> Result<usize> {
        if !(self.interval > 0.0) {
            return Err(anyhow!("Dummy feed interval must be positive"));
        }

        self.since_batch += dt;
        if self.since_batch < self.interval {
            return Ok(0);
        }
        self.since_batch = 0.0;

        let snapshot = core.snapshot();
        let count = snapshot.len();
        for (_, mut vehicle) in snapshot {
            if let Some(jitter) = &self.jitter {
                vehicle.velocity.x += jitter.sample(&mut self.rng);
                vehicle.velocity.y += jitter.sample(&mut self.rng);
            }
            core.add_vehicle(vehicle); // upsert
        }

        log::debug!(target: LOG_TARGET, "Dummy feed upserted {} vehicles", count);
        Ok(count)
    }

    fn get_name(&self) -> &'static str {
        "dummy"
    }
}
