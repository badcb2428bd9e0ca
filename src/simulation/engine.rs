use super::congestion::{speed_factor, update_congestion};
use super::{
    load_vehicles_csv, SegmentStatistics, Vehicle, VehicleId, VehicleMap, HISTORY_SIZE, LOG_TARGET,
};
use crate::alerts::AlertType;
use crate::config::{AlertThresholds, SimulationParams, TrafficConfig};
use crate::error::{Result, TrafficError};
use crate::network::{RoadGraph, SegmentId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard};

/// Road graph handle shared between the application and the simulation.
pub type SharedGraph = Arc<RwLock<RoadGraph>>;

/// Receives `(type, segment, message)` for every alert condition found during
/// a rollup. Runs while the simulation lock is held and must not call back
/// into the [`SimulationCore`].
pub type AlertCallback = Arc<dyn Fn(AlertType, SegmentId, &str) + Send + Sync>;

/// Samples required before a segment has a usable baseline speed.
const MIN_BASELINE_SAMPLES: usize = 2;

pub fn shared_graph(graph: RoadGraph) -> SharedGraph {
    Arc::new(RwLock::new(graph))
}

/// Vehicle set, kinematics, statistics and alert evaluation behind a single
/// lock. One thread drives [`update`](Self::update); any number of threads
/// may read snapshots concurrently.
pub struct SimulationCore {
    state: Mutex<CoreState>,
}

struct CoreState {
    graph: Option<SharedGraph>,
    vehicles: VehicleMap,
    segment_stats: HashMap<SegmentId, SegmentStatistics>,
    speed_limits: HashMap<SegmentId, f32>,
    thresholds: AlertThresholds,
    alerts_enabled: bool,
    alert_callback: Option<AlertCallback>,
    params: SimulationParams,
    since_rollup: f64,
    clock: f64,
    rng: StdRng,
}

/// Result of sampling one occupied segment in a rollup.
struct SegmentSample {
    segment_id: SegmentId,
    mean_speed: f32, // mean |velocity|
    effective_speed: f32, // mean speed after the congestion slowdown
}

struct RaisedAlert {
    alert_type: AlertType,
    segment_id: SegmentId,
    message: String,
}

impl Default for SimulationCore {
    fn default() -> Self {
        Self::new(None, SimulationParams::default())
    }
}

impl SimulationCore {
    pub fn new(graph: Option<SharedGraph>, params: SimulationParams) -> Self {
        let rng = if let Some(seed) = params.seed {
            StdRng::seed_from_u64(seed)
        } else {
            StdRng::from_entropy()
        };

        Self {
            state: Mutex::new(CoreState {
                graph,
                vehicles: VehicleMap::new(),
                segment_stats: HashMap::new(),
                speed_limits: HashMap::new(),
                thresholds: AlertThresholds::default(),
                alerts_enabled: false,
                alert_callback: None,
                params,
                since_rollup: 0.0,
                clock: 0.0,
                rng,
            }),
        }
    }

    pub fn from_config(graph: Option<SharedGraph>, config: &TrafficConfig) -> Self {
        let core = Self::new(graph, config.simulation.clone());
        {
            let mut state = core.lock();
            state.thresholds = config.alerts.thresholds;
            state.alerts_enabled = config.alerts.enabled;
        }
        core
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the vehicle source and, when no graph is attached yet, the road
    /// source. Previous vehicles, statistics and speed limits are discarded.
    pub fn initialize<P, Q>(&self, road_source: P, vehicle_source: Q) -> Result<()>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let mut state = self.lock();
        state.reset();

        if state.graph.is_none() {
            let mut graph = RoadGraph::new();
            if let Err(e) = graph.load_csv(road_source.as_ref()) {
                log::error!(target: LOG_TARGET, "Failed to load road network from {}: {}",
                            road_source.as_ref().display(), e);
                return Err(e);
            }
            state.graph = Some(shared_graph(graph));
        }

        let vehicle_source = vehicle_source.as_ref();
        let vehicles = load_vehicles_csv(vehicle_source)?;
        if vehicles.is_empty() {
            log::error!(target: LOG_TARGET, "Failed to load vehicle information from {}",
                        vehicle_source.display());
            return Err(TrafficError::EmptySource(vehicle_source.display().to_string()));
        }

        state.populate(vehicles);
        Ok(())
    }

    /// Same as [`initialize`](Self::initialize) for an already attached graph
    /// and an in-memory vehicle list.
    pub fn initialize_with(&self, vehicles: Vec<Vehicle>) -> Result<()> {
        let mut state = self.lock();
        if state.graph.is_none() {
            return Err(TrafficError::NoRoadGraph);
        }
        if vehicles.is_empty() {
            return Err(TrafficError::EmptySource("vehicle list".to_string()));
        }

        state.reset();
        state.populate(vehicles);
        Ok(())
    }

    /// Advances the simulation by `dt` seconds.
    pub fn update(&self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            log::warn!(target: LOG_TARGET, "Ignoring update with invalid dt {}", dt);
            return;
        }

        let mut guard = self.lock();
        let state = &mut *guard;
        state.clock += dt;

        let Some(graph) = state.graph.clone() else {
            return;
        };
        state.since_rollup += dt;

        let raised = {
            let mut net = write_graph(&graph);
            state.advance_vehicles(&mut net, dt as f32);

            if state.since_rollup >= state.params.stat_update_interval {
                let sampled = state.roll_up(&mut net);
                state.since_rollup = 0.0;
                if state.alerts_enabled && state.alert_callback.is_some() {
                    state.evaluate_alerts(&net, &sampled)
                } else {
                    Vec::new()
                }
            } else {
                Vec::new()
            }
        };

        // Graph lock is released before anything outside the core runs.
        state.dispatch(raised);
    }

    /// Copy of the full vehicle set.
    pub fn snapshot(&self) -> VehicleMap {
        self.lock().vehicles.clone()
    }

    pub fn segment_stats(&self) -> HashMap<SegmentId, SegmentStatistics> {
        self.lock().segment_stats.clone()
    }

    pub fn congestion_levels(&self) -> HashMap<SegmentId, f32> {
        let state = self.lock();
        let Some(graph) = &state.graph else {
            return HashMap::new();
        };
        let net = graph.read().unwrap_or_else(PoisonError::into_inner);
        net.segments()
            .map(|segment| (segment.id, segment.congestion_level))
            .collect()
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<Vehicle> {
        self.lock().vehicles.get(&id).cloned()
    }

    pub fn vehicle_count(&self) -> usize {
        self.lock().vehicles.len()
    }

    /// Simulated seconds since the last (re)initialization.
    pub fn elapsed(&self) -> f64 {
        self.lock().clock
    }

    /// Inserts or replaces a vehicle. A replaced vehicle's old segment gives
    /// up its count before the new one is charged.
    pub fn add_vehicle(&self, vehicle: Vehicle) {
        let mut state = self.lock();
        log::debug!(target: LOG_TARGET, "Adding vehicle {}", vehicle.id);
        state.upsert(vehicle);
    }

    pub fn remove_vehicle(&self, id: VehicleId) -> Option<Vehicle> {
        let mut state = self.lock();
        log::debug!(target: LOG_TARGET, "Removing vehicle {}", id);

        let per_lane = state.params.lane_capacity;
        let removed = state.vehicles.remove(&id)?;
        if let Some(graph) = &state.graph {
            leave(&mut write_graph(graph), removed.segment_id, per_lane);
        }
        Some(removed)
    }

    pub fn set_speed_limit(&self, segment_id: SegmentId, limit: f32) {
        self.lock().speed_limits.insert(segment_id, limit);
    }

    /// Explicit limit for the segment, or the configured default.
    pub fn speed_limit(&self, segment_id: SegmentId) -> f32 {
        self.lock().speed_limit(segment_id)
    }

    pub fn set_alert_threshold(&self, alert_type: AlertType, threshold: f32) {
        self.lock().thresholds.set(alert_type, threshold);
    }

    pub fn alert_threshold(&self, alert_type: AlertType) -> f32 {
        self.lock().thresholds.get(alert_type)
    }

    pub fn enable_alerts(&self, enable: bool) {
        self.lock().alerts_enabled = enable;
    }

    pub fn alerts_enabled(&self) -> bool {
        self.lock().alerts_enabled
    }

    pub fn set_alert_callback(&self, callback: Option<AlertCallback>) {
        self.lock().alert_callback = callback;
    }

    /// Unregisters `callback` if it is still the registered one. Returns
    /// whether it was removed.
    pub fn clear_alert_callback(&self, callback: &AlertCallback) -> bool {
        let mut state = self.lock();
        let registered = state
            .alert_callback
            .as_ref()
            .is_some_and(|current| std::ptr::addr_eq(Arc::as_ptr(current), Arc::as_ptr(callback)));
        if registered {
            state.alert_callback = None;
        }
        registered
    }

    pub fn road_graph(&self) -> Option<SharedGraph> {
        self.lock().graph.clone()
    }

    /// Swaps in a new graph and recounts the current vehicles onto it.
    pub fn attach_graph(&self, graph: SharedGraph) {
        let mut state = self.lock();
        let per_lane = state.params.lane_capacity;
        {
            let mut net = write_graph(&graph);
            reset_counts(&mut net, per_lane);
            for vehicle in state.vehicles.values() {
                enter(&mut net, vehicle.segment_id, per_lane);
            }
        }
        state.graph = Some(graph);
    }
}

impl CoreState {
    fn reset(&mut self) {
        self.vehicles.clear();
        self.segment_stats.clear();
        self.speed_limits.clear();
        self.since_rollup = 0.0;
        self.clock = 0.0;
        if let Some(graph) = &self.graph {
            reset_counts(&mut write_graph(graph), self.params.lane_capacity);
        }
    }

    fn populate(&mut self, vehicles: Vec<Vehicle>) {
        let count = vehicles.len();
        for vehicle in vehicles {
            self.upsert(vehicle);
        }
        log::info!(target: LOG_TARGET, "Initialized {} vehicles in the simulation", count);
    }

    fn upsert(&mut self, vehicle: Vehicle) {
        let per_lane = self.params.lane_capacity;
        let (id, segment_id) = (vehicle.id, vehicle.segment_id);
        let previous = self.vehicles.insert(id, vehicle);

        let Some(graph) = &self.graph else {
            return;
        };
        let mut net = write_graph(graph);
        if let Some(previous) = previous {
            leave(&mut net, previous.segment_id, per_lane);
        }
        if enter(&mut net, segment_id, per_lane) {
            log::debug!(target: LOG_TARGET, "Segment {} now has {} vehicles", segment_id,
                        net.segment(segment_id).map_or(0, |s| s.vehicle_count));
        } else {
            log::debug!(target: LOG_TARGET, "Vehicle {} references unknown segment {}",
                        id, segment_id);
        }
    }

    fn speed_limit(&self, segment_id: SegmentId) -> f32 {
        self.speed_limits
            .get(&segment_id)
            .copied()
            .unwrap_or(self.params.default_speed_limit)
    }

    fn advance_vehicles(&mut self, net: &mut RoadGraph, dt: f32) {
        let per_lane = self.params.lane_capacity;
        let CoreState { vehicles, rng, .. } = self;

        for vehicle in vehicles.values_mut() {
            // Vehicles on unknown segments stay put until the graph knows them.
            let Some(segment) = net.segment(vehicle.segment_id) else {
                continue;
            };
            if segment.length <= 0.0 {
                continue;
            }
            let current = vehicle.segment_id;
            let (length, to_node) = (segment.length, segment.to_node);

            let speed = vehicle.speed() * speed_factor(segment.congestion_level);
            vehicle.position += speed * dt / length;

            if vehicle.position > 1.0 {
                vehicle.position -= 1.0;

                let next = {
                    let outgoing = net.outgoing(to_node);
                    (!outgoing.is_empty()).then(|| outgoing[rng.gen_range(0..outgoing.len())])
                };
                // Dead ends keep the vehicle looping on its segment.
                if let Some(next) = next {
                    vehicle.segment_id = next;
                    if next != current {
                        leave(net, current, per_lane);
                        enter(net, next, per_lane);
                    }
                }
                vehicle.position = vehicle.position.clamp(0.0, 1.0);
            }

            if let Some(segment) = net.segment_mut(current) {
                segment.current_speed = speed;
            }
        }
    }

    /// Samples every occupied segment. Sampled segments get their current
    /// speed set to the mean effective vehicle speed.
    fn roll_up(&mut self, net: &mut RoadGraph) -> Vec<SegmentSample> {
        let per_lane = self.params.lane_capacity;

        let mut occupancy: BTreeMap<SegmentId, (u32, f32)> = BTreeMap::new();
        for vehicle in self.vehicles.values() {
            if net.segment(vehicle.segment_id).is_none() {
                continue;
            }
            let entry = occupancy.entry(vehicle.segment_id).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += vehicle.speed();
        }

        let mut sampled = Vec::with_capacity(occupancy.len());
        for (segment_id, (count, total_speed)) in occupancy {
            let mean_speed = total_speed / count as f32;
            let mut effective_speed = mean_speed;
            if let Some(segment) = net.segment_mut(segment_id) {
                segment.vehicle_count = count;
                update_congestion(segment, per_lane);
                effective_speed = mean_speed * speed_factor(segment.congestion_level);
                segment.current_speed = effective_speed;
            }
            self.segment_stats
                .entry(segment_id)
                .or_default()
                .add_sample(mean_speed, count, self.clock);
            sampled.push(SegmentSample { segment_id, mean_speed, effective_speed });
        }
        sampled
    }

    fn baseline_speed(&self, segment_id: SegmentId) -> Option<f32> {
        let stats = self.segment_stats.get(&segment_id)?;
        if stats.valid_samples() < MIN_BASELINE_SAMPLES {
            return None;
        }
        let baseline = stats.windowed_average(HISTORY_SIZE);
        (baseline > 0.0).then_some(baseline)
    }

    fn evaluate_alerts(&self, net: &RoadGraph, sampled: &[SegmentSample]) -> Vec<RaisedAlert> {
        let thresholds = &self.thresholds;
        let measured: HashMap<SegmentId, &SegmentSample> =
            sampled.iter().map(|sample| (sample.segment_id, sample)).collect();
        let mut raised = Vec::new();
        let mut raise = |alert_type, segment_id, message: String| {
            raised.push(RaisedAlert { alert_type, segment_id, message });
        };

        for segment in net.segments() {
            let id = segment.id;
            if segment.congestion_level >= thresholds.congestion {
                raise(
                    AlertType::Congestion,
                    id,
                    format!("Heavy traffic detected on road segment {}", id),
                );
            }

            // Speed checks need vehicles measured in this rollup.
            let Some(sample) = measured.get(&id) else {
                continue;
            };
            let baseline = self.baseline_speed(id);
            if let Some(baseline) = baseline {
                if sample.effective_speed / baseline < thresholds.unusual_slowdown {
                    raise(
                        AlertType::UnusualSlowdown,
                        id,
                        format!("Unusual slowdown detected on road segment {}", id),
                    );
                }
            }

            let speed = sample.mean_speed;
            let limit = self.speed_limit(id);
            if speed > limit * thresholds.speed_violation {
                raise(
                    AlertType::SpeedViolation,
                    id,
                    format!(
                        "Vehicles exceeding the speed limit on road segment {} ({:.1} m/s, limit {:.1} m/s)",
                        id, speed, limit
                    ),
                );
            }
            if let Some(baseline) = baseline {
                if speed < baseline * (1.0 - thresholds.incident) {
                    raise(
                        AlertType::Incident,
                        id,
                        format!(
                            "Possible incident on road segment {}: speed fell to {:.1} m/s from {:.1} m/s",
                            id, speed, baseline
                        ),
                    );
                }
            }
        }
        raised
    }

    fn dispatch(&self, raised: Vec<RaisedAlert>) {
        let Some(callback) = &self.alert_callback else {
            return;
        };
        for alert in raised {
            callback(alert.alert_type, alert.segment_id, &alert.message);
        }
    }
}

fn write_graph(graph: &SharedGraph) -> RwLockWriteGuard<'_, RoadGraph> {
    graph.write().unwrap_or_else(PoisonError::into_inner)
}

/// Charges one vehicle to the segment. Returns false for unknown segments.
fn enter(net: &mut RoadGraph, segment_id: SegmentId, per_lane: f32) -> bool {
    match net.segment_mut(segment_id) {
        Some(segment) => {
            segment.vehicle_count += 1;
            update_congestion(segment, per_lane);
            true
        }
        None => false,
    }
}

fn leave(net: &mut RoadGraph, segment_id: SegmentId, per_lane: f32) {
    if let Some(segment) = net.segment_mut(segment_id) {
        if segment.vehicle_count > 0 {
            segment.vehicle_count -= 1;
            update_congestion(segment, per_lane);
        }
    }
}

fn reset_counts(net: &mut RoadGraph, per_lane: f32) {
    for id in net.segment_ids() {
        if let Some(segment) = net.segment_mut(id) {
            segment.vehicle_count = 0;
            update_congestion(segment, per_lane);
        }
    }
}
