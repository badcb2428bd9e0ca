use crate::config::{FeedKind, FeedParams};
use crate::simulation::SimulationCore;
use anyhow::Result;

pub mod dummy;
pub mod scripted;

pub use dummy::*;
pub use scripted::*;

pub(crate) const LOG_TARGET: &str = "traffic_monitor::feed";

/// Producer of vehicle upserts driven from the application's frame loop.
pub trait VehicleFeed {
    /// Pushes any pending updates into `core`, returning how many were applied.
    fn poll(&mut self, core: &SimulationCore, dt: f32) -> Result<usize>;
    fn get_name(&self) -> &'static str;
}

pub enum FeedBackend {
    Dummy(DummyFeed),
    Scripted(ScriptedFeed),
}

impl FeedBackend {
    /// Builds the feed selected in configuration, `None` for `kind = "none"`.
    pub fn from_params(params: &FeedParams, seed: Option<u64>) -> Option<Self> {
        match params.kind {
            FeedKind::None => None,
            FeedKind::Dummy => Some(FeedBackend::Dummy(DummyFeed::new(
                params.interval,
                params.jitter,
                seed,
            ))),
        }
    }
}

impl VehicleFeed for FeedBackend {
    fn poll(&mut self, core: &SimulationCore, dt: f32) -> Result<usize> {
        match self {
            FeedBackend::Dummy(feed) => feed.poll(core, dt),
            FeedBackend::Scripted(feed) => feed.poll(core, dt),
        }
    }

    fn get_name(&self) -> &'static str {
        match self {
            FeedBackend::Dummy(feed) => feed.get_name(),
            FeedBackend::Scripted(feed) => feed.get_name(),
        }
    }
}
