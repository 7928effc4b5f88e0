//! `OrbitTracker`: owns the set of live trackers and routes scheduler/RPC events to them.
//!
//! Grounded on the original `OrbitTracker` module class, with the bus/logger access moved
//! behind [`crate::bus::MessageBus`] instead of `self.publish`/`self.log`.

use std::sync::Arc;

use hifitime::Duration as HifiDuration;
use tracing::Level;

use crate::bus::{MessageBus, OrbitRpcRequest, SchedulerTaskEvent, TrackerEvent, TrackerStatusMessage};
use crate::ephemeris::{EphemerisAdapter, PassFilter};
use crate::error::TrackerError;
use crate::tracker::{TargetTracker, TrackerHandle, DEFAULT_PREAOS_TIME};

/// Maintains the set of active [`TargetTracker`]s and routes inbound scheduler/RPC events.
pub struct OrbitTracker {
    ephemeris: Arc<dyn EphemerisAdapter>,
    bus: Arc<dyn MessageBus>,
    scheduler_enabled: bool,
    trackers: Vec<TrackerHandle>,
}

impl OrbitTracker {
    /// Builds a supervisor with no active trackers.
    pub fn new(
        ephemeris: Arc<dyn EphemerisAdapter>,
        bus: Arc<dyn MessageBus>,
        scheduler_enabled: bool,
    ) -> Self {
        OrbitTracker {
            ephemeris,
            bus,
            scheduler_enabled,
            trackers: Vec::new(),
        }
    }

    /// Handles a `scheduler.task.start` / `scheduler.task.end` event.
    ///
    /// Ignored entirely when `scheduler_enabled` is false or the event does not name the
    /// `"orbit"` tracker type, matching the original's early returns in `scheduler_event`.
    pub async fn handle_scheduler_event(&mut self, routing_key: &str, event: SchedulerTaskEvent) {
        if !self.scheduler_enabled || event.tracker != "orbit" {
            return;
        }
        match routing_key {
            "task.start" => {
                let filter = PassFilter {
                    min_elevation: event.min_elevation.unwrap_or(0.0),
                    min_max_elevation: event.min_max_elevation.unwrap_or(0.0),
                    sun_max_elevation: event.sun_max_elevation,
                    sunlit: event.sunlit,
                    partial_last_pass: true,
                    ..Default::default()
                };
                let preaos = event
                    .preaos_time
                    .map(|s| HifiDuration::from_seconds(s as f64))
                    .unwrap_or(HifiDuration::from_seconds(DEFAULT_PREAOS_TIME as f64));
                // Scheduler events have no reply channel; add_target already logs the reason
                // for any rejection.
                let _ = self
                    .add_target(&event.target, event.rotators, filter, preaos, None)
                    .await;
            }
            "task.end" => {
                self.remove_target(&event.target, &event.rotators).await;
            }
            _ => {}
        }
    }

    /// Handles an `orbit.rpc.*` RPC request.
    pub async fn handle_rpc(
        &mut self,
        request: OrbitRpcRequest,
    ) -> Result<Option<serde_json::Value>, TrackerError> {
        match request {
            OrbitRpcRequest::AddTarget {
                target,
                rotators,
                preaos_time,
                high_accuracy,
            } => {
                let preaos = preaos_time
                    .map(|s| HifiDuration::from_seconds(s as f64))
                    .unwrap_or(HifiDuration::from_seconds(DEFAULT_PREAOS_TIME as f64));
                self.add_target(&target, rotators, PassFilter::default(), preaos, high_accuracy)
                    .await?;
                Ok(None)
            }
            OrbitRpcRequest::RemoveTarget { target, rotators } => {
                self.remove_target(&target, &rotators).await;
                Ok(None)
            }
            OrbitRpcRequest::Status => {
                let status = self.status_message().await;
                Ok(Some(serde_json::to_value(status).unwrap_or(serde_json::Value::Null)))
            }
            OrbitRpcRequest::GetTargetPosition { target } => {
                let resolved = if self.ephemeris.is_celestial_name(&target) {
                    self.ephemeris
                        .get_celestial_object(&target, PassFilter::default())
                        .await
                } else {
                    self.ephemeris.get_satellite(&target, PassFilter::default()).await
                };
                match resolved {
                    Some(t) => Ok(Some(serde_json::json!({ "target": t.target_name() }))),
                    None => Ok(None),
                }
            }
        }
    }

    /// Starts tracking `target_name` with `rotators`.
    ///
    /// Rejects (after logging) an empty name/rotator set, a `target_name` already tracked, an
    /// ephemeris adapter that cannot resolve the name, or a target with no upcoming pass,
    /// returning the matching [`TrackerError`] so RPC callers can report why nothing happened.
    pub async fn add_target(
        &mut self,
        target_name: &str,
        rotators: Vec<String>,
        filter: PassFilter,
        preaos_time: HifiDuration,
        high_accuracy: Option<bool>,
    ) -> Result<(), TrackerError> {
        if target_name.is_empty() || rotators.is_empty() {
            self.bus.log(Level::ERROR, "add_target: target must not be empty");
            return Err(TrackerError::EmptyTarget);
        }
        if self.trackers.iter().any(|t| t.target_name() == target_name) {
            self.bus.log(
                Level::WARN,
                &format!("add_target: target {target_name:?} is already tracked"),
            );
            return Err(TrackerError::DuplicateTarget(target_name.to_owned()));
        }

        self.bus.log(
            Level::INFO,
            &format!("starting to track target {target_name:?} with {rotators:?}"),
        );

        let target = if self.ephemeris.is_celestial_name(target_name) {
            self.ephemeris.get_celestial_object(target_name, filter).await
        } else {
            self.ephemeris.get_satellite(target_name, filter).await
        };

        let Some(target) = target else {
            self.bus.log(
                Level::ERROR,
                &format!("add_target: could not find target {target_name:?}"),
            );
            return Err(TrackerError::UnknownTarget(target_name.to_owned()));
        };

        let Some(next_pass) = target.get_next_pass() else {
            self.bus.log(
                Level::ERROR,
                &format!("add_target: no passes available for {target_name:?}"),
            );
            return Err(TrackerError::NoPassAvailable(target_name.to_owned()));
        };

        self.bus
            .emit_event(
                "next_pass",
                TrackerEvent {
                    target: target_name.to_owned(),
                    rotators: rotators.clone(),
                    fields: next_pass
                        .to_fields()
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect(),
                },
            )
            .await;

        let target: Arc<dyn crate::ephemeris::Target> = Arc::from(target);
        let handle = TargetTracker::spawn(target, rotators, preaos_time, high_accuracy, self.bus.clone());
        self.trackers.push(handle);
        Ok(())
    }

    /// Stops tracking `target_name` on the given `rotators`; trackers whose rotator set becomes
    /// empty are dropped from the supervisor's collection.
    pub async fn remove_target(&mut self, target_name: &str, rotators: &[String]) {
        self.bus.log(
            Level::INFO,
            &format!("stop tracking target {target_name:?} with {rotators:?}"),
        );
        let mut keep = Vec::with_capacity(self.trackers.len());
        for handle in self.trackers.drain(..) {
            if handle.target_name() == target_name {
                let empty = handle.stop(rotators.to_vec()).await;
                if empty {
                    continue;
                }
            }
            keep.push(handle);
        }
        self.trackers = keep;
    }

    /// The number of trackers currently active.
    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    async fn status_message(&self) -> Vec<TrackerStatusMessage> {
        let mut out = Vec::with_capacity(self.trackers.len());
        for handle in &self.trackers {
            if let Some(status) = handle.status().await {
                out.push(status);
            }
        }
        out
    }
}
