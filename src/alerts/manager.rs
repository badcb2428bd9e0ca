use super::{Alert, AlertType, LOG_TARGET};
use crate::config::AlertParams;
use crate::network::SegmentId;
use crate::simulation::{AlertCallback, SimulationCore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Notified once for every newly admitted alert. Alerts raised by a rollup
/// reach the listener while the simulation is locked, so it must not call
/// into the [`SimulationCore`].
pub type AlertListener = Arc<dyn Fn(&Alert) + Send + Sync>;

pub const DEFAULT_MAX_ALERTS: usize = 100;

/// Deduplicating, bounded alert history fed by a [`SimulationCore`].
///
/// Construction registers a forwarding callback on the simulation, replacing
/// any earlier one. Dropping the manager removes its callback unless another
/// manager has registered since.
pub struct AlertManager {
    sim: Arc<SimulationCore>,
    book: Arc<AlertBook>,
    callback: AlertCallback,
}

// State shared with the callback registered on the simulation.
struct AlertBook {
    enabled: AtomicBool,
    max_alerts: usize,
    alerts: Mutex<VecDeque<Alert>>, // newest first
    listener: RwLock<Option<AlertListener>>,
}

impl AlertBook {
    fn history(&self) -> MutexGuard<'_, VecDeque<Alert>> {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self, alert_type: AlertType, segment_id: SegmentId, message: &str) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }

        let alert = {
            let mut alerts = self.history();
            let duplicate = alerts
                .iter()
                .any(|a| !a.acknowledged && a.matches(alert_type, segment_id));
            if duplicate {
                return false;
            }

            let alert = Alert::new(alert_type, segment_id, message);
            alerts.push_front(alert.clone());
            alerts.truncate(self.max_alerts);
            alert
        };

        log::info!(target: LOG_TARGET, "[Alert] {}", alert.message);

        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener(&alert);
        }
        true
    }
}

impl AlertManager {
    /// Starts disabled with the default history capacity.
    pub fn new(sim: Arc<SimulationCore>) -> Self {
        Self::with_capacity(sim, DEFAULT_MAX_ALERTS, false)
    }

    /// Applies capacity, enabled flag and thresholds from configuration.
    pub fn with_params(sim: Arc<SimulationCore>, params: &AlertParams) -> Self {
        let manager = Self::with_capacity(sim, params.max_history, params.enabled);
        for alert_type in AlertType::ALL {
            manager.set_threshold(alert_type, params.thresholds.get(alert_type));
        }
        manager.sim.enable_alerts(params.enabled);
        manager
    }

    fn with_capacity(sim: Arc<SimulationCore>, max_alerts: usize, enabled: bool) -> Self {
        let book = Arc::new(AlertBook {
            enabled: AtomicBool::new(enabled),
            max_alerts: max_alerts.max(1),
            alerts: Mutex::new(VecDeque::with_capacity(max_alerts)),
            listener: RwLock::new(None),
        });

        let forward = Arc::clone(&book);
        let callback: AlertCallback = Arc::new(move |alert_type, segment_id, message: &str| {
            forward.admit(alert_type, segment_id, message);
        });
        sim.set_alert_callback(Some(Arc::clone(&callback)));

        Self { sim, book, callback }
    }

    /// Toggles alert intake here and evaluation in the simulation. Disabling
    /// drops the whole history.
    pub fn set_enabled(&self, enabled: bool) {
        self.book.enabled.store(enabled, Ordering::Release);
        self.sim.enable_alerts(enabled);

        if !enabled {
            self.book.history().clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.book.enabled.load(Ordering::Acquire)
    }

    /// Records an alert unless an unacknowledged one already covers the same
    /// segment and type. Returns whether the alert was admitted.
    pub fn add_alert(&self, alert_type: AlertType, segment_id: SegmentId, message: &str) -> bool {
        self.book.admit(alert_type, segment_id, message)
    }

    /// Marks the alert at `index` (newest first) as acknowledged. Out of
    /// range indices are ignored.
    pub fn acknowledge_alert(&self, index: usize) {
        if let Some(alert) = self.book.history().get_mut(index) {
            alert.acknowledged = true;
        }
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.book
            .history()
            .iter()
            .filter(|alert| !alert.acknowledged)
            .cloned()
            .collect()
    }

    /// Full history, acknowledged alerts included, newest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.book.history().iter().cloned().collect()
    }

    pub fn set_listener(&self, listener: Option<AlertListener>) {
        *self.book.listener.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub fn set_threshold(&self, alert_type: AlertType, threshold: f32) {
        self.sim.set_alert_threshold(alert_type, threshold);
    }

    pub fn simulation(&self) -> &Arc<SimulationCore> {
        &self.sim
    }
}

impl Drop for AlertManager {
    fn drop(&mut self) {
        if !self.sim.clear_alert_callback(&self.callback) {
            log::debug!(target: LOG_TARGET,
                        "Alert callback already replaced, leaving it registered");
        }
    }
}
