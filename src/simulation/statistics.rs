/// Number of rollup samples kept per segment.
pub const HISTORY_SIZE: usize = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    pub avg_speed: f32,
    pub vehicle_count: u32,
    pub timestamp: f64, // simulation seconds; 0 marks an unwritten slot
}

impl Sample {
    pub fn is_valid(&self) -> bool {
        self.timestamp != 0.0
    }
}

/// Fixed-capacity circular history of per-segment rollup samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStatistics {
    samples: [Sample; HISTORY_SIZE],
    cursor: usize,
}

impl Default for SegmentStatistics {
    fn default() -> Self {
        Self {
            samples: [Sample::default(); HISTORY_SIZE],
            cursor: 0,
        }
    }
}

impl SegmentStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the oldest slot.
    pub fn add_sample(&mut self, avg_speed: f32, vehicle_count: u32, timestamp: f64) {
        self.samples[self.cursor] = Sample {
            avg_speed,
            vehicle_count,
            timestamp,
        };
        self.cursor = (self.cursor + 1) % HISTORY_SIZE;
    }

    /// Valid samples, newest first.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> + '_ {
        (1..=HISTORY_SIZE)
            .map(move |back| &self.samples[(self.cursor + HISTORY_SIZE - back) % HISTORY_SIZE])
            .filter(|sample| sample.is_valid())
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples().next()
    }

    pub fn valid_samples(&self) -> usize {
        self.samples().count()
    }

    /// Mean speed over the most recent `n` valid samples, or 0.0 when there
    /// are none. Callers treat 0.0 as "no baseline yet".
    pub fn windowed_average(&self, n: usize) -> f32 {
        mean(self.samples().take(n).map(|s| s.avg_speed))
    }

    /// Mean vehicle count over the most recent `n` valid samples.
    pub fn windowed_vehicle_count(&self, n: usize) -> f32 {
        mean(self.samples().take(n).map(|s| s.vehicle_count as f32))
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}
