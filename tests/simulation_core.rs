use traffic_monitor::{
    alerts::AlertType,
    config::SimulationParams,
    error::TrafficError,
    network::{RoadGraph, RoadRow, SegmentId, Vec2},
    simulation::{shared_graph, SimulationCore, Vehicle, HISTORY_SIZE},
};
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::thread;

fn graph_from(rows: &[(u32, i32, i32, i32, i32)]) -> Result<RoadGraph> {
    let mut graph = RoadGraph::new();
    graph.load_from_rows(rows.iter().map(|&(id, x1, y1, x2, y2)| RoadRow::new(id, x1, y1, x2, y2)))?;
    Ok(graph)
}

fn seeded(seed: u64) -> SimulationParams {
    SimulationParams {
        seed: Some(seed),
        ..Default::default()
    }
}

/// Effectively unlimited lane capacity so that congestion stays at zero
fn free_flow(seed: u64) -> SimulationParams {
    SimulationParams {
        lane_capacity: 1.0e9,
        ..seeded(seed)
    }
}

fn car(id: u64, segment: SegmentId, position: f32, speed: f32) -> Vehicle {
    Vehicle::new(id, segment, position, Vec2::new(speed, 0.0))
}

type Recorded = Arc<Mutex<Vec<(AlertType, SegmentId, String)>>>;

fn record_alerts(core: &SimulationCore) -> Recorded {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    core.set_alert_callback(Some(Arc::new(move |alert_type, segment, message: &str| {
        sink.lock().unwrap().push((alert_type, segment, message.to_string()));
    })));
    core.enable_alerts(true);
    recorded
}

fn drain(recorded: &Recorded) -> Vec<(AlertType, SegmentId)> {
    recorded
        .lock()
        .unwrap()
        .drain(..)
        .map(|(alert_type, segment, _)| (alert_type, segment))
        .collect()
}

fn segment_count(core: &SimulationCore, id: SegmentId) -> u32 {
    let graph = core.road_graph().expect("graph attached");
    let net = graph.read().unwrap();
    net.segment(id).map_or(0, |s| s.vehicle_count)
}

#[test]
fn test_vehicle_crosses_onto_next_segment() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10, 0), (2, 10, 0, 20, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), free_flow(1));
    core.initialize_with(vec![car(1, 1, 0.95, 5.0)])?;

    core.update(0.2);

    let vehicle = core.vehicle(1).expect("vehicle still present");
    assert_eq!(vehicle.segment_id, 2);
    assert!((vehicle.position - 0.05).abs() < 1e-4, "position {}", vehicle.position);
    assert_eq!(segment_count(&core, 1), 0);
    assert_eq!(segment_count(&core, 2), 1);
    Ok(())
}

#[test]
fn test_congestion_slows_progress() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 100, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(2));
    // Five vehicles on one lane of capacity five
    core.initialize_with((1..=5).map(|id| car(id, 1, 0.0, 10.0)).collect())?;

    assert_eq!(core.congestion_levels()[&1], 1.0);
    core.update(0.5);

    // Full congestion leaves 20% of the 10 m/s over 0.5 s on a 100 m segment
    let vehicle = core.vehicle(3).unwrap();
    assert!((vehicle.position - 0.01).abs() < 1e-5, "position {}", vehicle.position);
    Ok(())
}

#[test]
fn test_dead_end_loops_on_same_segment() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), free_flow(3));
    core.initialize_with(vec![car(1, 1, 0.95, 5.0)])?;

    core.update(0.2);

    let vehicle = core.vehicle(1).unwrap();
    assert_eq!(vehicle.segment_id, 1);
    assert!((vehicle.position - 0.05).abs() < 1e-4);
    assert_eq!(segment_count(&core, 1), 1);
    Ok(())
}

#[test]
fn test_branch_choice_uses_outgoing_segments() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10, 0), (2, 10, 0, 20, 0), (3, 10, 0, 10, 10)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), free_flow(4));
    core.initialize_with((1..=50).map(|id| car(id, 1, 0.99, 1.0)).collect())?;

    core.update(0.2);

    let snapshot = core.snapshot();
    assert!(snapshot.values().all(|v| v.segment_id == 2 || v.segment_id == 3));
    assert!(snapshot.values().any(|v| v.segment_id == 2));
    assert!(snapshot.values().any(|v| v.segment_id == 3));
    assert_eq!(segment_count(&core, 1), 0);
    assert_eq!(segment_count(&core, 2) + segment_count(&core, 3), 50);
    Ok(())
}

#[test]
fn test_seeded_runs_replay_identically() -> Result<()> {
    let rows = [(1, 0, 0, 10, 0), (2, 10, 0, 20, 0), (3, 10, 0, 10, 10), (4, 20, 0, 0, 0)];
    let vehicles: Vec<Vehicle> = (1..=20).map(|id| car(id, 1 + (id % 3) as u32, 0.5, 4.0)).collect();

    let run = || -> Result<_> {
        let core = SimulationCore::new(Some(shared_graph(graph_from(&rows)?)), seeded(99));
        core.initialize_with(vehicles.clone())?;
        for _ in 0..300 {
            core.update(1.0 / 60.0);
        }
        Ok(core.snapshot())
    };

    assert_eq!(run()?, run()?);
    Ok(())
}

#[test]
fn test_snapshot_is_stable_without_updates() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(5));
    core.initialize_with(vec![car(1, 1, 0.1, 2.0), car(2, 1, 0.6, 3.0)])?;

    assert_eq!(core.snapshot(), core.snapshot());
    assert_eq!(core.vehicle_count(), 2);
    assert!(core.vehicle(7).is_none());
    Ok(())
}

#[test]
fn test_upsert_and_remove_keep_counts_exact() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10, 0), (2, 10, 0, 20, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(6));
    core.initialize_with(vec![car(1, 1, 0.0, 1.0)])?;

    core.add_vehicle(car(1, 1, 0.5, 2.0));
    assert_eq!(segment_count(&core, 1), 1, "upserting in place must not double count");
    assert_eq!(core.vehicle(1).unwrap().position, 0.5);

    core.add_vehicle(car(1, 2, 0.2, 2.0));
    assert_eq!(segment_count(&core, 1), 0);
    assert_eq!(segment_count(&core, 2), 1);

    let removed = core.remove_vehicle(1).expect("vehicle was present");
    assert_eq!(removed.segment_id, 2);
    assert_eq!(segment_count(&core, 2), 0);
    assert!(core.remove_vehicle(1).is_none());
    assert_eq!(core.vehicle_count(), 0);
    Ok(())
}

#[test]
fn test_vehicle_on_unknown_segment_is_inert() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(7));
    core.initialize_with(vec![car(1, 1, 0.0, 1.0), car(2, 42, 0.3, 5.0)])?;

    for _ in 0..120 {
        core.update(1.0 / 60.0);
    }

    let stray = core.vehicle(2).expect("stray vehicle is kept");
    assert_eq!(stray.segment_id, 42);
    assert_eq!(stray.position, 0.3);
    assert!(!core.segment_stats().contains_key(&42));
    Ok(())
}

#[test]
fn test_update_without_graph_only_advances_clock() {
    let core = SimulationCore::new(None, seeded(8));
    core.add_vehicle(car(1, 1, 0.25, 5.0));

    core.update(0.5);

    assert_eq!(core.elapsed(), 0.5);
    assert_eq!(core.vehicle(1).unwrap().position, 0.25);
    assert!(core.segment_stats().is_empty());
    assert!(core.congestion_levels().is_empty());
}

#[test]
fn test_invalid_tick_is_ignored() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(9));
    core.initialize_with(vec![car(1, 1, 0.25, 5.0)])?;

    core.update(0.0);
    core.update(-1.0);
    core.update(f64::NAN);

    assert_eq!(core.elapsed(), 0.0);
    assert_eq!(core.vehicle(1).unwrap().position, 0.25);
    Ok(())
}

#[test]
fn test_rollup_records_mean_speed_per_occupied_segment() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10000, 0), (2, 0, 100, 10000, 100)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(10));
    core.initialize_with(vec![car(1, 1, 0.0, 4.0), car(2, 1, 0.0, 8.0)])?;

    core.update(0.5);
    assert!(core.segment_stats().is_empty(), "no rollup before the interval elapses");

    core.update(0.5);
    let stats = core.segment_stats();
    let segment = stats.get(&1).expect("occupied segment sampled");
    let latest = segment.latest().unwrap();
    assert_eq!(latest.avg_speed, 6.0);
    assert_eq!(latest.vehicle_count, 2);
    assert_eq!(latest.timestamp, 1.0);
    assert!(!stats.contains_key(&2), "empty segments are not sampled");

    for _ in 0..HISTORY_SIZE + 10 {
        core.update(1.0);
    }
    assert_eq!(core.segment_stats()[&1].valid_samples(), HISTORY_SIZE);
    Ok(())
}

#[test]
fn test_initialize_replaces_state() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10000, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(11));
    core.initialize_with(vec![car(1, 1, 0.0, 4.0)])?;
    core.set_speed_limit(1, 3.0);
    core.update(1.0);
    assert!(!core.segment_stats().is_empty());

    core.initialize_with(vec![car(5, 1, 0.0, 4.0), car(6, 1, 0.0, 4.0)])?;
    assert!(core.vehicle(1).is_none());
    assert_eq!(core.vehicle_count(), 2);
    assert!(core.segment_stats().is_empty());
    assert_eq!(core.elapsed(), 0.0);
    assert_eq!(core.speed_limit(1), SimulationParams::default().default_speed_limit);
    assert_eq!(segment_count(&core, 1), 2);
    Ok(())
}

#[test]
fn test_initialize_failures() -> Result<()> {
    let core = SimulationCore::new(None, seeded(12));
    assert!(matches!(core.initialize_with(vec![car(1, 1, 0.0, 1.0)]), Err(TrafficError::NoRoadGraph)));
    assert!(core.initialize("/nonexistent/roads.csv", "/nonexistent/vehicles.csv").is_err());
    assert!(core.road_graph().is_none());

    core.attach_graph(shared_graph(graph_from(&[(1, 0, 0, 10, 0)])?));
    assert!(matches!(core.initialize_with(Vec::new()), Err(TrafficError::EmptySource(_))));
    Ok(())
}

#[test]
fn test_initialize_from_files() -> Result<()> {
    let dir = std::env::temp_dir();
    let roads = dir.join(format!("traffic_monitor_roads_{}.csv", std::process::id()));
    let vehicles = dir.join(format!("traffic_monitor_vehicles_{}.csv", std::process::id()));
    std::fs::write(&roads, "segmentId,x1,y1,x2,y2\n1,0,0,10,0\n2,10,0,20,0\n")?;
    std::fs::write(&vehicles, "id,segmentId,position,velX,velY,type\n1,1,0.5,3,4,bus\n2,2,0.1,1,0,\n")?;

    let core = SimulationCore::new(None, seeded(13));
    let loaded = core.initialize(&roads, &vehicles);
    std::fs::remove_file(&roads)?;
    std::fs::remove_file(&vehicles)?;
    loaded?;

    let graph = core.road_graph().expect("graph created from the road source");
    assert_eq!(graph.read().unwrap().segment_count(), 2);
    let bus = core.vehicle(1).unwrap();
    assert_eq!(bus.kind, "bus");
    assert_eq!(bus.speed(), 5.0);
    assert_eq!(core.vehicle(2).unwrap().kind, "car");
    Ok(())
}

#[test]
fn test_attach_graph_recounts_vehicles() -> Result<()> {
    let core = SimulationCore::new(None, seeded(14));
    core.add_vehicle(car(1, 2, 0.0, 1.0));
    core.add_vehicle(car(2, 2, 0.0, 1.0));

    core.attach_graph(shared_graph(graph_from(&[(1, 0, 0, 10, 0), (2, 10, 0, 20, 0)])?));

    assert_eq!(segment_count(&core, 2), 2);
    assert_eq!(segment_count(&core, 1), 0);
    Ok(())
}

#[test]
fn test_speed_limits_fall_back_to_default() {
    let core = SimulationCore::default();
    assert_eq!(core.speed_limit(1), 13.9);
    core.set_speed_limit(1, 25.0);
    assert_eq!(core.speed_limit(1), 25.0);
    assert_eq!(core.speed_limit(2), 13.9);

    core.set_alert_threshold(AlertType::Congestion, 0.9);
    assert_eq!(core.alert_threshold(AlertType::Congestion), 0.9);
    assert!(!core.alerts_enabled());
}

#[test]
fn test_congestion_alert_raised_every_rollup() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10000, 0), (2, 0, 100, 10000, 100)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(15));
    core.initialize_with((1..=5).map(|id| car(id, 1, 0.0, 10.0)).collect())?;
    let recorded = record_alerts(&core);

    core.update(1.0);
    core.update(1.0);

    let raised = recorded.lock().unwrap().clone();
    let congestion: Vec<_> = raised.iter().filter(|a| a.0 == AlertType::Congestion).collect();
    assert_eq!(congestion.len(), 2);
    assert!(congestion.iter().all(|a| a.1 == 1));
    assert_eq!(congestion[0].2, "Heavy traffic detected on road segment 1");
    Ok(())
}

#[test]
fn test_no_alerts_while_disabled() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10000, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(16));
    core.initialize_with((1..=5).map(|id| car(id, 1, 0.0, 10.0)).collect())?;
    let recorded = record_alerts(&core);
    core.enable_alerts(false);

    core.update(1.0);
    assert!(drain(&recorded).is_empty());

    core.enable_alerts(true);
    core.update(1.0);
    assert!(drain(&recorded).contains(&(AlertType::Congestion, 1)));
    Ok(())
}

#[test]
fn test_slowdown_and_incident_against_baseline() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10000, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(17));
    core.initialize_with(vec![car(1, 1, 0.0, 10.0)])?;
    let recorded = record_alerts(&core);

    // Two quiet rollups establish a 10 m/s baseline
    core.update(1.0);
    core.update(1.0);
    assert!(drain(&recorded).is_empty());

    // Saturate the lane: current speed drops to 20% of free flow
    for id in 2..=5 {
        core.add_vehicle(car(id, 1, 0.0, 10.0));
    }
    core.update(1.0);
    let raised = drain(&recorded);
    assert!(raised.contains(&(AlertType::Congestion, 1)));
    assert!(raised.contains(&(AlertType::UnusualSlowdown, 1)));
    assert!(!raised.contains(&(AlertType::Incident, 1)));

    // Measured speeds collapse far below the baseline
    for id in 1..=5 {
        core.add_vehicle(car(id, 1, 0.0, 0.5));
    }
    core.update(1.0);
    assert!(drain(&recorded).contains(&(AlertType::Incident, 1)));
    Ok(())
}

#[test]
fn test_speed_violation_uses_segment_limit() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10000, 0), (2, 0, 100, 10000, 100)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(18));
    core.initialize_with(vec![car(1, 1, 0.0, 30.0), car(2, 2, 0.0, 30.0)])?;
    core.set_speed_limit(2, 25.0);
    let recorded = record_alerts(&core);

    core.update(1.0);

    let raised = recorded.lock().unwrap().clone();
    let violations: Vec<_> = raised.iter().filter(|a| a.0 == AlertType::SpeedViolation).collect();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].1, 1);
    assert!(violations[0].2.contains("road segment 1"));
    Ok(())
}

#[test]
fn test_concurrent_readers_see_consistent_snapshots() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10, 0), (2, 10, 0, 20, 0), (3, 20, 0, 0, 0)])?;
    let core = Arc::new(SimulationCore::new(Some(shared_graph(graph)), seeded(19)));
    core.initialize_with((1..=30).map(|id| car(id, 1 + (id % 3) as u32, 0.5, 6.0)).collect())?;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let core = Arc::clone(&core);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = core.snapshot();
                    assert_eq!(snapshot.len(), 30);
                    assert!(snapshot.values().all(|v| (0.0..=1.0).contains(&v.position)));
                    let _ = core.congestion_levels();
                }
            })
        })
        .collect();

    for _ in 0..600 {
        core.update(1.0 / 60.0);
    }
    for reader in readers {
        reader.join().expect("reader thread panicked");
    }

    let total: u32 = (1..=3).map(|id| segment_count(&core, id)).sum();
    assert_eq!(total, 30);
    Ok(())
}

#[test]
fn test_steady_fast_traffic_is_not_a_slowdown() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10000, 0)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(20));
    core.initialize_with(vec![car(1, 1, 0.0, 25.0)])?;
    let recorded = record_alerts(&core);

    for _ in 0..4 {
        core.update(1.0);
    }

    let raised = drain(&recorded);
    assert!(raised.contains(&(AlertType::SpeedViolation, 1)));
    assert!(
        !raised.iter().any(|(alert_type, _)| *alert_type == AlertType::UnusualSlowdown),
        "steady traffic raised {:?}",
        raised
    );

    // Current speed reflects the vehicles, not the free-flow default
    let graph = core.road_graph().unwrap();
    let current = graph.read().unwrap().segment(1).unwrap().current_speed;
    assert!((current - 25.0 * 0.84).abs() < 1e-3, "current speed {}", current);
    Ok(())
}

#[test]
fn test_vacated_segment_raises_no_speed_alerts() -> Result<()> {
    let graph = graph_from(&[(1, 0, 0, 10000, 0), (2, 0, 100, 10000, 100)])?;
    let core = SimulationCore::new(Some(shared_graph(graph)), seeded(21));
    core.initialize_with(vec![car(1, 1, 0.0, 12.0)])?;
    let recorded = record_alerts(&core);

    for _ in 0..3 {
        core.update(1.0);
    }
    assert!(drain(&recorded).is_empty());

    // Segment 1 keeps a fast history but has no vehicles left to measure
    core.add_vehicle(car(1, 2, 0.0, 12.0));
    for _ in 0..3 {
        core.update(1.0);
    }
    let raised = drain(&recorded);
    assert!(
        raised.iter().all(|(_, segment)| *segment != 1),
        "vacated segment raised {:?}",
        raised
    );
    Ok(())
}
