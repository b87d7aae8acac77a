//! Asset registry.
//!
//! Owns every asset of one lineside module, keyed by identity, and is the only
//! way the protocol layer reaches them. Every state change an operation
//! produces is pushed onto the report channel in the order it happened; the
//! message exchange turns those into STATE_CHANGE frames.
//!
//! Timed behavior (points traversal, intermittent track circuit failures)
//! runs on spawned tasks that sleep through the [`Environment`], so the same
//! code runs against the wall clock and a simulated one.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use lineside_proto::{Aspect, MovementAuthorityClass, PointsPosition, RouteExit, StatusReport};
use tokio::{
    sync::{Mutex, mpsc},
    task::AbortHandle,
};

use crate::{
    ConstructionError,
    env::Environment,
    error::OperationRejected,
    points::{DetectionPolicy, MoveOutcome, Points, PointsPower},
    signal::{AutomaticSignal, ControlledSignal, LampStatus, SignalIdentity},
    train_detection::{FailureStatus, TrainDetectionSection},
};

/// Upper bound on the gap between two intermittent failure flickers.
pub const INTERMITTENT_MAX_INTERVAL: Duration = Duration::from_secs(10);

type Shared<T> = Arc<Mutex<T>>;

/// Every asset of one module.
#[derive(Debug)]
pub struct AssetRegistry<E: Environment> {
    env: E,
    reports: mpsc::UnboundedSender<StatusReport>,
    points: BTreeMap<String, Shared<Points>>,
    controlled: BTreeMap<String, Shared<ControlledSignal>>,
    automatic: BTreeMap<String, Shared<AutomaticSignal>>,
    sections: BTreeMap<String, Shared<TrainDetectionSection>>,
    intermittent_tasks: Mutex<BTreeMap<String, AbortHandle>>,
}

impl<E: Environment> AssetRegistry<E> {
    /// Create an empty registry reporting state changes on `reports`.
    pub fn new(env: E, reports: mpsc::UnboundedSender<StatusReport>) -> Self {
        Self {
            env,
            reports,
            points: BTreeMap::new(),
            controlled: BTreeMap::new(),
            automatic: BTreeMap::new(),
            sections: BTreeMap::new(),
            intermittent_tasks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a set of points.
    pub fn add_points(&mut self, points: Points) -> Result<(), ConstructionError> {
        insert_unique(&mut self.points, points.identity().to_string(), points)
    }

    /// Register a controlled signal.
    pub fn add_controlled_signal(&mut self, signal: ControlledSignal) -> Result<(), ConstructionError> {
        let key = signal.identity().key();
        if self.automatic.contains_key(&key) {
            return Err(ConstructionError::Duplicate(key));
        }
        insert_unique(&mut self.controlled, key, signal)
    }

    /// Register an automatic or repeater signal.
    pub fn add_automatic_signal(&mut self, signal: AutomaticSignal) -> Result<(), ConstructionError> {
        let key = signal.identity().key();
        if self.controlled.contains_key(&key) {
            return Err(ConstructionError::Duplicate(key));
        }
        insert_unique(&mut self.automatic, key, signal)
    }

    /// Register a train detection section.
    pub fn add_section(&mut self, section: TrainDetectionSection) -> Result<(), ConstructionError> {
        insert_unique(&mut self.sections, section.identity().to_string(), section)
    }

    /// Total number of assets.
    pub fn len(&self) -> usize {
        self.points.len() + self.controlled.len() + self.automatic.len() + self.sections.len()
    }

    /// Whether the registry holds no assets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit(&self, report: StatusReport) {
        emit(&self.reports, report);
    }

    fn emit_opt(&self, report: Option<StatusReport>) {
        if let Some(report) = report {
            self.emit(report);
        }
    }

    fn points_entry(&self, id: &str) -> Result<&Shared<Points>, OperationRejected> {
        self.points.get(id).ok_or_else(|| unknown("points", id))
    }

    fn section_entry(&self, id: &str) -> Result<&Shared<TrainDetectionSection>, OperationRejected> {
        self.sections.get(id).ok_or_else(|| unknown("train detection section", id))
    }

    fn controlled_entry(
        &self,
        prefix: &str,
        id: &str,
    ) -> Result<&Shared<ControlledSignal>, OperationRejected> {
        signal_key(prefix, id)
            .and_then(|key| self.controlled.get(&key))
            .ok_or_else(|| unknown("controlled signal", &format!("{prefix}{id}")))
    }

    fn automatic_entry(
        &self,
        prefix: &str,
        id: &str,
    ) -> Result<&Shared<AutomaticSignal>, OperationRejected> {
        signal_key(prefix, id)
            .and_then(|key| self.automatic.get(&key))
            .ok_or_else(|| unknown("automatic signal", &format!("{prefix}{id}")))
    }

    /// Move a set of points.
    ///
    /// A move under power reports the start and mid-stroke states at once and
    /// the final state when the traversal timer fires.
    pub async fn move_points(&self, id: &str, to: PointsPosition) -> Result<(), OperationRejected> {
        let entry = self.points_entry(id)?;
        let mut points = entry.lock().await;
        match points.begin_move(to)? {
            MoveOutcome::Started { duration, start, mid } => {
                tracing::info!(points = %id, to = %to, ?duration, "points moving");
                self.emit(start);
                self.emit(mid);

                let entry = Arc::clone(entry);
                let env = self.env.clone();
                let reports = self.reports.clone();
                tokio::spawn(async move {
                    env.sleep(duration).await;
                    let mut points = entry.lock().await;
                    if let Some(report) = points.complete_move() {
                        tracing::info!(points = %points.identity(), position = %points.position(), detected = points.detected(), "points move complete");
                        emit(&reports, report);
                    }
                });
            },
            MoveOutcome::Settled(report) => self.emit(report),
            MoveOutcome::Secured(report) => {
                tracing::info!(points = %id, "points secured, move refused");
                self.emit(report);
            },
        }
        Ok(())
    }

    /// Clip (`true`) or unclip a set of points.
    pub async fn secure_points(&self, id: &str, secured: bool) -> Result<(), OperationRejected> {
        let report = self.points_entry(id)?.lock().await.set_secured(secured);
        self.emit_opt(report);
        Ok(())
    }

    /// Switch a set of points between power and hand working.
    pub async fn set_points_power(&self, id: &str, power: PointsPower) -> Result<(), OperationRejected> {
        self.points_entry(id)?.lock().await.set_power(power);
        Ok(())
    }

    /// Change the detection policy of a set of points.
    pub async fn set_detection_policy(
        &self,
        id: &str,
        policy: DetectionPolicy,
    ) -> Result<(), OperationRejected> {
        let report = self.points_entry(id)?.lock().await.set_detection_policy(policy);
        self.emit_opt(report);
        Ok(())
    }

    /// Set the power traversal time of a set of points (clamped).
    pub async fn set_operation_interval(
        &self,
        id: &str,
        interval: Duration,
    ) -> Result<(), OperationRejected> {
        self.points_entry(id)?.lock().await.set_operation_interval(interval);
        Ok(())
    }

    /// Act on a movement authority for a controlled signal.
    pub async fn request_controlled_signal(
        &self,
        prefix: &str,
        id: &str,
        route_exit: Option<RouteExit>,
        authority: MovementAuthorityClass,
        aspect: Option<Aspect>,
    ) -> Result<(), OperationRejected> {
        let report = self
            .controlled_entry(prefix, id)?
            .lock()
            .await
            .apply_authority(authority, route_exit, aspect)?;
        self.emit_opt(report);
        Ok(())
    }

    /// Show the most or least restrictive aspect of an automatic signal.
    pub async fn set_automatic_display(
        &self,
        prefix: &str,
        id: &str,
        most_restrictive: bool,
    ) -> Result<(), OperationRejected> {
        let report = self
            .automatic_entry(prefix, id)?
            .lock()
            .await
            .set_display_highest_aspect(most_restrictive)?;
        self.emit_opt(report);
        Ok(())
    }

    /// Set a lamp of any signal by index.
    pub async fn set_lamp_status(
        &self,
        prefix: &str,
        id: &str,
        index: usize,
        status: LampStatus,
    ) -> Result<(), OperationRejected> {
        let report = if let Ok(entry) = self.controlled_entry(prefix, id) {
            entry.lock().await.set_lamp_status(index, status)?
        } else {
            self.automatic_entry(prefix, id)?.lock().await.set_lamp_status(index, status)?
        };
        self.emit_opt(report);
        Ok(())
    }

    /// Set the lamp for `aspect` of any signal.
    pub async fn set_lamp_status_for(
        &self,
        prefix: &str,
        id: &str,
        aspect: Aspect,
        status: LampStatus,
    ) -> Result<(), OperationRejected> {
        let report = if let Ok(entry) = self.controlled_entry(prefix, id) {
            entry.lock().await.set_lamp_status_for(aspect, status)?
        } else {
            self.automatic_entry(prefix, id)?.lock().await.set_lamp_status_for(aspect, status)?
        };
        self.emit_opt(report);
        Ok(())
    }

    /// Apply or remove a technician shunt.
    pub async fn tec_shunt(&self, id: &str, on: bool) -> Result<(), OperationRejected> {
        let report = self.section_entry(id)?.lock().await.tec_shunt(on)?;
        self.emit_opt(report);
        Ok(())
    }

    /// A train enters a section.
    pub async fn train_occupies(&self, id: &str) -> Result<(), OperationRejected> {
        let report = self.section_entry(id)?.lock().await.train_occupies();
        self.emit_opt(report);
        Ok(())
    }

    /// A train leaves a section.
    pub async fn train_clears(&self, id: &str) -> Result<(), OperationRejected> {
        let report = self.section_entry(id)?.lock().await.train_clears();
        self.emit_opt(report);
        Ok(())
    }

    /// Apply or clear a failure mode on a section.
    pub async fn set_failure_status(
        &self,
        id: &str,
        status: FailureStatus,
    ) -> Result<(), OperationRejected> {
        let report = self.section_entry(id)?.lock().await.set_failure_status(status)?;
        self.emit_opt(report);
        Ok(())
    }

    /// Start an intermittent failure on a track circuit.
    ///
    /// The section flickers at random intervals below
    /// [`INTERMITTENT_MAX_INTERVAL`] until restored.
    pub async fn set_intermittent(&self, id: &str) -> Result<(), OperationRejected> {
        let entry = self.section_entry(id)?;
        entry.lock().await.set_intermittent()?;
        tracing::info!(section = %id, "intermittent failure started");

        let entry = Arc::clone(entry);
        let env = self.env.clone();
        let reports = self.reports.clone();
        let task = tokio::spawn(async move {
            loop {
                env.sleep(env.random_duration(INTERMITTENT_MAX_INTERVAL)).await;
                let mut section = entry.lock().await;
                if !section.intermittent() {
                    break;
                }
                if let Some(report) = section.intermittent_toggle() {
                    emit(&reports, report);
                }
            }
        });

        if let Some(previous) =
            self.intermittent_tasks.lock().await.insert(id.to_string(), task.abort_handle())
        {
            previous.abort();
        }
        Ok(())
    }

    /// End an intermittent failure.
    pub async fn restore_intermittent(&self, id: &str) -> Result<(), OperationRejected> {
        let report = self.section_entry(id)?.lock().await.restore_intermittent()?;
        if let Some(task) = self.intermittent_tasks.lock().await.remove(id) {
            task.abort();
        }
        tracing::info!(section = %id, "intermittent failure restored");
        self.emit_opt(report);
        Ok(())
    }

    /// Current state of every asset: points, controlled signals, automatic
    /// signals, then sections, each in identity order.
    pub async fn snapshot(&self) -> Vec<StatusReport> {
        let mut reports = Vec::with_capacity(self.len());
        for points in self.points.values() {
            reports.push(points.lock().await.status());
        }
        for signal in self.controlled.values() {
            reports.push(signal.lock().await.status());
        }
        for signal in self.automatic.values() {
            reports.push(signal.lock().await.status());
        }
        for section in self.sections.values() {
            reports.push(section.lock().await.report());
        }
        reports
    }

    /// Human-readable listing of the configured assets.
    pub async fn inventory(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.len());
        for points in self.points.values() {
            let points = points.lock().await;
            lines.push(format!(
                "Points {} [detection {}, {}]",
                points.identity(),
                points.policy(),
                points.power()
            ));
        }
        for signal in self.controlled.values() {
            let signal = signal.lock().await;
            lines.push(format!("Controlled signal {} [{}]", signal.identity(), signal.signal_type()));
        }
        for signal in self.automatic.values() {
            let signal = signal.lock().await;
            match signal.repeats() {
                Some(repeated) => lines.push(format!(
                    "Automatic signal {} [{}, repeats {repeated}]",
                    signal.identity(),
                    signal.signal_type()
                )),
                None => lines.push(format!(
                    "Automatic signal {} [{}]",
                    signal.identity(),
                    signal.signal_type()
                )),
            }
        }
        for section in self.sections.values() {
            let section = section.lock().await;
            lines.push(format!("Train detection {} [{}]", section.identity(), section.technology()));
        }
        lines
    }

    /// Copy of a set of points' current state.
    pub async fn points(&self, id: &str) -> Option<Points> {
        Some(self.points.get(id)?.lock().await.clone())
    }

    /// Copy of a controlled signal's current state.
    pub async fn controlled_signal(&self, prefix: &str, id: &str) -> Option<ControlledSignal> {
        Some(self.controlled_entry(prefix, id).ok()?.lock().await.clone())
    }

    /// Copy of an automatic signal's current state.
    pub async fn automatic_signal(&self, prefix: &str, id: &str) -> Option<AutomaticSignal> {
        Some(self.automatic_entry(prefix, id).ok()?.lock().await.clone())
    }

    /// Copy of a section's current state.
    pub async fn section(&self, id: &str) -> Option<TrainDetectionSection> {
        Some(self.sections.get(id)?.lock().await.clone())
    }
}

fn emit(reports: &mpsc::UnboundedSender<StatusReport>, report: StatusReport) {
    tracing::debug!(report = %report, "status change");
    if reports.send(report).is_err() {
        tracing::debug!("report channel closed, status change dropped");
    }
}

fn unknown(kind: &'static str, identity: &str) -> OperationRejected {
    OperationRejected::UnknownAsset { kind, identity: identity.to_string() }
}

fn signal_key(prefix: &str, id: &str) -> Option<String> {
    SignalIdentity::new(prefix, id).ok().map(|identity| identity.key())
}

fn insert_unique<T>(
    map: &mut BTreeMap<String, Shared<T>>,
    key: String,
    value: T,
) -> Result<(), ConstructionError> {
    if map.contains_key(&key) {
        return Err(ConstructionError::Duplicate(key));
    }
    map.insert(key, Arc::new(Mutex::new(value)));
    Ok(())
}
