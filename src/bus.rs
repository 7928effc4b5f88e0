//! The `MessageBus` trait and the inbound/outbound payload types exchanged with the external
//! message bus.
//!
//! The original ties the tracker back to its owning module to call `send_event`,
//! `broadcast_pointing` and the module logger, which creates a reference cycle and makes the
//! tracker impossible to construct without a live bus connection. This crate inverts that: the
//! tracker and supervisor hold a `dyn MessageBus` and never reference each other directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A pointing sample published while a tracker is in the `TRACKING` state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointingSample {
    /// Target name.
    pub target: String,
    /// Rotators this sample applies to.
    pub rotators: Vec<String>,
    /// Azimuth, degrees, wrapped to (-180, 180], rounded to 0.01.
    pub az: f64,
    /// Elevation, degrees, clamped to >= 0, rounded to 0.01.
    pub el: f64,
    /// Slant range, metres, rounded to 0.01.
    pub range: f64,
    /// Range rate, metres per second, rounded to 0.01.
    pub range_rate: f64,
    /// Prediction timestamp, seconds since the Unix epoch.
    pub timestamp: f64,
}

/// A `next_pass`/`preaos`/`aos`/`los` lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerEvent {
    /// Target name.
    pub target: String,
    /// Rotators this event applies to.
    pub rotators: Vec<String>,
    /// Extra fields carried alongside the event (e.g. a pass's `t_aos`/`t_los` on `next_pass`
    /// and `preaos`), as flattened key/value pairs.
    pub fields: Vec<(String, String)>,
}

/// Outbound interface a tracker/supervisor uses to talk to the external message bus.
///
/// Implementations own the actual transport (AMQP, NATS, an in-process test double); this
/// crate only shapes and schedules the calls.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a lifecycle event (`next_pass`, `preaos`, `aos`, `los`) on the `event`
    /// exchange under routing key `event_name`.
    async fn emit_event(&self, event_name: &'static str, event: TrackerEvent);

    /// Publishes a pointing sample on the `tracking` exchange under routing key
    /// `target.position`.
    async fn publish_pointing(&self, sample: PointingSample);

    /// Structured log sink, used in place of a back-reference to the owning module's logger.
    fn log(&self, level: tracing::Level, message: &str);
}

/// `scheduler.task.start` / `scheduler.task.end` payload, as received on the `scheduler`
/// exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerTaskEvent {
    /// The tracker type this task targets; only `"orbit"` tasks are handled here.
    pub tracker: String,
    /// Target name to track.
    pub target: String,
    /// Rotators to assign.
    pub rotators: Vec<String>,
    /// Pass filter fields forwarded to `add_target`, present only on `task.start`.
    #[serde(default)]
    pub start_time: Option<String>,
    /// See [`SchedulerTaskEvent::start_time`].
    #[serde(default)]
    pub end_time: Option<String>,
    /// See [`SchedulerTaskEvent::start_time`].
    #[serde(default)]
    pub min_elevation: Option<f64>,
    /// See [`SchedulerTaskEvent::start_time`].
    #[serde(default)]
    pub min_max_elevation: Option<f64>,
    /// See [`SchedulerTaskEvent::start_time`].
    #[serde(default)]
    pub sun_max_elevation: Option<f64>,
    /// See [`SchedulerTaskEvent::start_time`].
    #[serde(default)]
    pub sunlit: Option<bool>,
    /// See [`SchedulerTaskEvent::start_time`].
    #[serde(default)]
    pub preaos_time: Option<u64>,
}

/// `orbit.rpc.*` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OrbitRpcRequest {
    /// `orbit.rpc.add_target`.
    AddTarget {
        /// Target name.
        target: String,
        /// Rotators to assign.
        rotators: Vec<String>,
        /// Pre-AOS lead time override, seconds.
        #[serde(default)]
        preaos_time: Option<u64>,
        /// `high_accuracy` override.
        #[serde(default)]
        high_accuracy: Option<bool>,
    },
    /// `orbit.rpc.remove_target`.
    RemoveTarget {
        /// Target name.
        target: String,
        /// Rotators to release.
        rotators: Vec<String>,
    },
    /// `orbit.rpc.status`.
    Status,
    /// `orbit.rpc.get_target_position`.
    GetTargetPosition {
        /// Target name to resolve and predict.
        target: String,
    },
}

/// A single tracker's status, as returned by `orbit.rpc.status`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackerStatusMessage {
    /// Target name, or `None` if this tracker has no live target.
    pub target: Option<String>,
    /// Rotators this tracker currently serves.
    pub rotators: Vec<String>,
    /// Human-readable status line (e.g. `"Tracking ISS"`).
    pub status: Option<String>,
    /// The tracker's next known pass, flattened to fields, if any.
    pub next_pass: Option<Vec<(String, String)>>,
}
