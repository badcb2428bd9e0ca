use super::{VehicleFeed, LOG_TARGET};
use crate::simulation::{SimulationCore, Vehicle, VehicleId};
use anyhow::Result;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Upsert(Vehicle),
    Remove(VehicleId),
}

#[derive(Debug, Clone, PartialEq)]
struct TimedEvent {
    at: f32,
    event: FeedEvent,
}

/// Replays a fixed list of events, each released once the feed's clock
/// reaches its timestamp.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    clock: f32,
    pending: VecDeque<TimedEvent>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `event` for release at `at` seconds. Events must be pushed in
    /// time order; an earlier timestamp is released with the one before it.
    pub fn push(&mut self, at: f32, event: FeedEvent) -> &mut Self {
        self.pending.push_back(TimedEvent { at, event });
        self
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl VehicleFeed for ScriptedFeed {
    fn poll(&mut self, core: &SimulationCore, dt: f32) -> Result<usize> {
        self.clock += dt;

        let mut applied = 0;
        while self.pending.front().is_some_and(|next| next.at <= self.clock) {
            let Some(TimedEvent { event, .. }) = self.pending.pop_front() else {
                break;
            };
            match event {
                FeedEvent::Upsert(vehicle) => core.add_vehicle(vehicle),
                FeedEvent::Remove(id) => {
                    if core.remove_vehicle(id).is_none() {
                        log::debug!(target: LOG_TARGET, "Scripted removal of unknown vehicle {}", id);
                    }
                }
            }
            applied += 1;
        }
        Ok(applied)
    }

    fn get_name(&self) -> &'static str {
        "scripted"
    }
}
