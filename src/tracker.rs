//! Per-(target, rotators) tracking state machine.
//!
//! One [`TargetTracker`] drives one target end to end: `WAITING` until AOS approaches, through
//! `TRACKING` with 1 Hz pointing broadcasts, to `LOS` and back to `WAITING` for the next pass.
//! Grounded on the original `TargetTracker`/`update_tracking`, with the module back-reference
//! replaced by the injected [`crate::bus::MessageBus`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use hifitime::{Duration as HifiDuration, Epoch};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Level;

use crate::bus::{MessageBus, PointingSample, TrackerEvent};
use crate::bus::TrackerStatusMessage;
use crate::ephemeris::Target;

/// Default pre-AOS lead time, seconds, matching `OrbitTracker.DEFAULT_PREAOS_TIME`.
pub const DEFAULT_PREAOS_TIME: u64 = 120;

/// Tick period of a tracker's driver loop.
const TICK_PERIOD: StdDuration = StdDuration::from_secs(2);

/// A tracker's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    /// The target has no usable pass schedule; the tracker is inert.
    Disabled,
    /// Waiting for AOS (or pre-AOS) of the next pass.
    Waiting,
    /// Inside the pre-AOS window, AOS not yet reached.
    Aos,
    /// Actively tracking; publishing pointing samples.
    Tracking,
    /// Just passed LOS; will return to `Waiting` on the next tick.
    Los,
}

enum TrackerCommand {
    Stop(Vec<String>, oneshot::Sender<bool>),
    Status(oneshot::Sender<TrackerStatusMessage>),
}

/// A handle a supervisor holds for a running tracker's driver task.
pub struct TrackerHandle {
    target_name: String,
    cmd_tx: mpsc::UnboundedSender<TrackerCommand>,
    join: JoinHandle<()>,
}

impl TrackerHandle {
    /// The target name this tracker was created for.
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Removes `rotators` from this tracker. If the tracker's rotator set becomes empty its
    /// driver task exits and `true` is returned so the caller can drop this handle.
    ///
    /// Waits for the driver task to actually process the removal (via a `oneshot` reply) rather
    /// than polling `JoinHandle::is_finished`, which would almost always observe `false` right
    /// after sending since the task has not yet had a chance to run.
    pub async fn stop(&self, rotators: Vec<String>) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(TrackerCommand::Stop(rotators, tx)).is_err() {
            return true;
        }
        rx.await.unwrap_or(true)
    }

    /// Requests this tracker's current status message.
    pub async fn status(&self) -> Option<TrackerStatusMessage> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(TrackerCommand::Status(tx)).ok()?;
        rx.await.ok()
    }

    /// Aborts the driver task unconditionally, without waiting for a clean LOS.
    pub fn abort(&self) {
        self.join.abort();
    }
}

/// Owns one target's tracking state and rotator assignment, and drives it to completion.
pub struct TargetTracker {
    target: Arc<dyn Target>,
    rotators: HashSet<String>,
    preaos_time: HifiDuration,
    status: TrackerStatus,
    high_accuracy: bool,
    bus: Arc<dyn MessageBus>,
    cmd_rx: mpsc::UnboundedReceiver<TrackerCommand>,
}

impl TargetTracker {
    /// Spawns a driver task for `target` and returns a handle to it.
    ///
    /// `high_accuracy` defaults to `true` iff the target is celestial, matching the original's
    /// `isinstance(target, CelestialObject)` check, evaluated here once at construction rather
    /// than via a late runtime type check.
    pub fn spawn(
        target: Arc<dyn Target>,
        rotators: Vec<String>,
        preaos_time: HifiDuration,
        high_accuracy: Option<bool>,
        bus: Arc<dyn MessageBus>,
    ) -> TrackerHandle {
        let target_name = target.target_name().to_owned();
        let high_accuracy = high_accuracy
            .unwrap_or(matches!(target.kind(), crate::ephemeris::TargetKind::Celestial));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let mut tracker = TargetTracker {
            target,
            rotators: rotators.into_iter().collect(),
            preaos_time,
            status: TrackerStatus::Waiting,
            high_accuracy,
            bus,
            cmd_rx,
        };
        let join = tokio::spawn(async move { tracker.run().await });
        TrackerHandle {
            target_name,
            cmd_tx,
            join,
        }
    }

    async fn run(&mut self) {
        loop {
            while let Ok(cmd) = self.cmd_rx.try_recv() {
                if self.handle_command(cmd).await {
                    return;
                }
            }
            if self.rotators.is_empty() {
                return;
            }
            self.tick(now()).await;
            tokio::select! {
                _ = tokio::time::sleep(TICK_PERIOD) => {}
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd).await {
                                return;
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// Returns `true` if the task should exit (rotator set became empty).
    async fn handle_command(&mut self, cmd: TrackerCommand) -> bool {
        match cmd {
            TrackerCommand::Stop(rotators, reply) => {
                let empty = self.stop(rotators).await;
                let _ = reply.send(empty);
                empty
            }
            TrackerCommand::Status(reply) => {
                let _ = reply.send(self.status_message());
                false
            }
        }
    }

    async fn stop(&mut self, rotators: Vec<String>) -> bool {
        let stop_set: HashSet<String> = rotators.into_iter().collect();
        let removed: Vec<String> = self.rotators.intersection(&stop_set).cloned().collect();
        self.rotators.retain(|r| !stop_set.contains(r));

        if !removed.is_empty() {
            self.bus
                .emit_event("los", self.event(removed, &[]))
                .await;
        }
        self.rotators.is_empty()
    }

    fn rotators_vec(&self) -> Vec<String> {
        let mut v: Vec<String> = self.rotators.iter().cloned().collect();
        v.sort();
        v
    }

    fn event(&self, rotators: Vec<String>, fields: &[(&str, String)]) -> TrackerEvent {
        TrackerEvent {
            target: self.target.target_name().to_owned(),
            rotators,
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    /// Advances the state machine by one tick, as of wall-clock time `now`.
    ///
    /// Takes `now` explicitly (rather than sampling the clock internally) so the transition
    /// table can be driven deterministically in tests.
    pub async fn tick(&mut self, now: Epoch) {
        let Some(next_pass) = self.target.get_next_pass() else {
            self.bus.log(
                Level::ERROR,
                &format!("no passes for {} {:?}", self.target.target_name(), self.rotators),
            );
            self.status = TrackerStatus::Disabled;
            return;
        };

        match self.status {
            TrackerStatus::Disabled => {}
            TrackerStatus::Waiting => {
                if now >= next_pass.t_aos {
                    self.bus
                        .emit_event("aos", self.event(self.rotators_vec(), &[]))
                        .await;
                    self.status = TrackerStatus::Tracking;
                } else if now >= next_pass.t_aos - self.preaos_time {
                    let fields = next_pass.to_fields();
                    let field_refs: Vec<(&str, String)> =
                        fields.iter().map(|(k, v)| (*k, v.clone())).collect();
                    self.bus
                        .emit_event("preaos", self.event(self.rotators_vec(), &field_refs))
                        .await;
                    self.status = TrackerStatus::Aos;
                }
            }
            TrackerStatus::Aos => {
                if now >= next_pass.t_aos {
                    self.bus
                        .emit_event("aos", self.event(self.rotators_vec(), &[]))
                        .await;
                    self.status = TrackerStatus::Tracking;
                }
            }
            TrackerStatus::Tracking => {
                let t = now + HifiDuration::from_seconds(1.0);
                let mut pos = self.target.pos_at(t, self.high_accuracy).await;
                if self.high_accuracy {
                    pos = pos.with_standard_refraction();
                }
                let mut az = pos.az;
                if az > 180.0 {
                    az -= 360.0;
                }
                let el = pos.el.max(0.0);

                self.bus
                    .publish_pointing(PointingSample {
                        target: self.target.target_name().to_owned(),
                        rotators: self.rotators_vec(),
                        az: round2(az),
                        el: round2(el),
                        range: round2(pos.range),
                        range_rate: round2(pos.range_rate),
                        timestamp: t.to_unix_seconds(),
                    })
                    .await;

                if now >= next_pass.t_los {
                    self.bus
                        .emit_event("los", self.event(self.rotators_vec(), &[]))
                        .await;
                    self.status = TrackerStatus::Los;
                }
            }
            TrackerStatus::Los => {
                self.status = TrackerStatus::Waiting;
                self.target.calculate_passes().await;
            }
        }
    }

    fn status_message(&self) -> TrackerStatusMessage {
        let status_text = match self.status {
            TrackerStatus::Aos => Some(format!("Pre-AOS for {}", self.target.target_name())),
            TrackerStatus::Tracking => Some(format!("Tracking {}", self.target.target_name())),
            TrackerStatus::Disabled => Some("Disabled".to_owned()),
            TrackerStatus::Waiting | TrackerStatus::Los => {
                Some(format!("Waiting for {}", self.target.target_name()))
            }
        };
        let next_pass = self.target.get_next_pass().map(|p| {
            p.to_fields()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect()
        });
        TrackerStatusMessage {
            target: Some(self.target.target_name().to_owned()),
            rotators: self.rotators_vec(),
            status: status_text,
            next_pass,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn now() -> Epoch {
    Epoch::now().unwrap_or(Epoch::from_unix_seconds(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::TrackerEvent as Event;
    use crate::ephemeris::{Position, TargetKind};
    use std::sync::Mutex as StdMutex;

    struct FixedTarget {
        name: String,
        pass: StdMutex<Option<crate::ephemeris::Pass>>,
        kind: TargetKind,
    }

    #[async_trait::async_trait]
    impl Target for FixedTarget {
        fn target_name(&self) -> &str {
            &self.name
        }
        fn kind(&self) -> TargetKind {
            self.kind
        }
        fn get_next_pass(&self) -> Option<crate::ephemeris::Pass> {
            self.pass.lock().unwrap().clone()
        }
        async fn pos_at(&self, _t: Epoch, _accurate: bool) -> Position {
            Position {
                el: 45.0,
                az: 190.0,
                range: 500_000.0,
                range_rate: -10.0,
            }
        }
        async fn calculate_passes(&self) {}
    }

    #[derive(Default)]
    struct RecordingBus {
        events: StdMutex<Vec<(&'static str, Event)>>,
        pointing: StdMutex<Vec<PointingSample>>,
    }

    #[async_trait::async_trait]
    impl MessageBus for RecordingBus {
        async fn emit_event(&self, name: &'static str, event: Event) {
            self.events.lock().unwrap().push((name, event));
        }
        async fn publish_pointing(&self, sample: PointingSample) {
            self.pointing.lock().unwrap().push(sample);
        }
        fn log(&self, _level: Level, _message: &str) {}
    }

    fn epoch_secs(s: f64) -> Epoch {
        Epoch::from_unix_seconds(s)
    }

    #[tokio::test]
    async fn waiting_transitions_to_aos_then_tracking() {
        let t_aos = epoch_secs(1000.0);
        let t_los = epoch_secs(1100.0);
        let target = Arc::new(FixedTarget {
            name: "ISS".to_owned(),
            pass: StdMutex::new(Some(crate::ephemeris::Pass {
                t_aos,
                t_los,
                max_elevation: Some(80.0),
            })),
            kind: TargetKind::Satellite,
        });
        let bus = Arc::new(RecordingBus::default());
        let mut tracker = TargetTracker {
            target,
            rotators: ["az-el".to_owned()].into_iter().collect(),
            preaos_time: HifiDuration::from_seconds(60.0),
            status: TrackerStatus::Waiting,
            high_accuracy: false,
            bus: bus.clone(),
            cmd_rx: mpsc::unbounded_channel().1,
        };

        tracker.tick(epoch_secs(960.0)).await;
        assert_eq!(tracker.status, TrackerStatus::Aos);

        tracker.tick(epoch_secs(1000.0)).await;
        assert_eq!(tracker.status, TrackerStatus::Tracking);

        tracker.tick(epoch_secs(1050.0)).await;
        assert_eq!(bus.pointing.lock().unwrap().len(), 1);

        tracker.tick(epoch_secs(1100.0)).await;
        assert_eq!(tracker.status, TrackerStatus::Los);

        tracker.tick(epoch_secs(1102.0)).await;
        assert_eq!(tracker.status, TrackerStatus::Waiting);

        let names: Vec<&str> = bus.events.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["preaos", "aos", "los"]);
    }

    #[tokio::test]
    async fn no_pass_disables_tracker() {
        let target = Arc::new(FixedTarget {
            name: "Ghost".to_owned(),
            pass: StdMutex::new(None),
            kind: TargetKind::Satellite,
        });
        let bus = Arc::new(RecordingBus::default());
        let mut tracker = TargetTracker {
            target,
            rotators: ["az-el".to_owned()].into_iter().collect(),
            preaos_time: HifiDuration::from_seconds(60.0),
            status: TrackerStatus::Waiting,
            high_accuracy: false,
            bus,
            cmd_rx: mpsc::unbounded_channel().1,
        };
        tracker.tick(epoch_secs(0.0)).await;
        assert_eq!(tracker.status, TrackerStatus::Disabled);
    }
}
