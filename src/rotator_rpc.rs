//! Thin consumer-side wrapper around the rotator driver's RPC surface.
//!
//! Grounded on the original `RotatorInterface`: every method here just shapes a request and
//! sends it through the injected [`MessageBus`]; none of them touch a servo.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::error::TrackerError;

const CALIBRATE_TIMEOUT: Duration = Duration::from_secs(15);
const RESET_POSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// The allowed position range on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    /// Minimum allowed value.
    pub min: f64,
    /// Maximum allowed value.
    pub max: f64,
}

/// Transport a [`RotatorClient`] sends RPC requests through.
///
/// Separated from [`crate::bus::MessageBus`] because rotator RPC requests are unicast
/// request/response, not pub/sub broadcasts; an embedder is free to implement both traits on
/// the same connection object.
#[async_trait::async_trait]
pub trait RotatorRpcTransport: Send + Sync {
    /// Sends an RPC request named `method` (e.g. `"<prefix>.rpc.rotate"`) with JSON `params`,
    /// bounded by `timeout`, and returns the decoded JSON reply.
    async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, TrackerError>;
}

/// Consumer-side wrapper over one rotator's RPC surface, identified by its `prefix`
/// (the original's `f"{prefix}.rpc.<op>"` routing key scheme).
pub struct RotatorClient<'a> {
    prefix: String,
    transport: &'a dyn RotatorRpcTransport,
}

impl<'a> RotatorClient<'a> {
    /// Builds a client for the rotator named `prefix`, using `transport` to send requests.
    pub fn new(prefix: impl Into<String>, transport: &'a dyn RotatorRpcTransport) -> Self {
        RotatorClient {
            prefix: prefix.into(),
            transport,
        }
    }

    fn method(&self, op: &str) -> String {
        format!("{}.rpc.{op}", self.prefix)
    }

    async fn call(&self, op: &str, params: Value, timeout: Duration) -> Result<Value, TrackerError> {
        self.transport.call(&self.method(op), params, timeout).await
    }

    /// Fetches the rotator's current status.
    pub async fn status(&self) -> Result<Value, TrackerError> {
        self.call("status", Value::Null, Duration::from_secs(5)).await
    }

    /// Commands the rotator to the given azimuth/elevation.
    pub async fn rotate(&self, az: f64, el: f64, shortest: bool) -> Result<(), TrackerError> {
        self.call(
            "rotate",
            serde_json::json!({ "az": az, "el": el, "shortest": shortest }),
            Duration::from_secs(5),
        )
        .await?;
        Ok(())
    }

    /// Moves to `(az, el)` ignoring position bounds and sets that position as the new origin.
    pub async fn calibrate(&self, az: f64, el: f64) -> Result<(), TrackerError> {
        self.call(
            "calibrate",
            serde_json::json!({ "az": az, "el": el, "force": true, "cal": true }),
            CALIBRATE_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    /// Resets the reported position to `(az, el)` without moving the rotator.
    pub async fn reset_position(&self, az: f64, el: f64) -> Result<(), TrackerError> {
        self.call(
            "reset_position",
            serde_json::json!({ "az": az, "el": el }),
            RESET_POSITION_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    /// Stops the rotator immediately.
    pub async fn stop(&self) -> Result<(), TrackerError> {
        self.call("stop", Value::Null, Duration::from_secs(5)).await?;
        Ok(())
    }

    /// Enables or disables automatic tracking mode.
    pub async fn set_tracking(&self, enabled: bool) -> Result<(), TrackerError> {
        self.call(
            "tracking",
            serde_json::json!({ "mode": if enabled { "automatic" } else { "manual" } }),
            Duration::from_secs(5),
        )
        .await?;
        Ok(())
    }

    /// Fetches the allowed position range for both axes.
    pub async fn get_position_range(&self) -> Result<(AxisRange, AxisRange), TrackerError> {
        let reply = self
            .call("get_position_range", Value::Null, Duration::from_secs(5))
            .await?;
        parse_range_pair(&reply)
    }

    /// Sets the allowed position range for both axes.
    pub async fn set_position_range(
        &self,
        az: AxisRange,
        el: AxisRange,
    ) -> Result<(), TrackerError> {
        self.call(
            "set_position_range",
            serde_json::json!({
                "az_min": az.min, "az_max": az.max,
                "el_min": el.min, "el_max": el.max,
            }),
            Duration::from_secs(5),
        )
        .await?;
        Ok(())
    }

    /// Fetches the allowed motor duty-cycle range for both axes.
    pub async fn get_dutycycle_range(&self) -> Result<(AxisRange, AxisRange), TrackerError> {
        let reply = self
            .call("get_dutycycle_range", Value::Null, Duration::from_secs(5))
            .await?;
        parse_range_pair(&reply)
    }

    /// Sets the allowed motor duty-cycle range for both axes.
    pub async fn set_dutycycle_range(
        &self,
        az: AxisRange,
        el: AxisRange,
    ) -> Result<(), TrackerError> {
        self.call(
            "set_dutycycle_range",
            serde_json::json!({
                "az_min": az.min, "az_max": az.max,
                "el_min": el.min, "el_max": el.max,
            }),
            Duration::from_secs(5),
        )
        .await?;
        Ok(())
    }
}

fn parse_range_pair(reply: &Value) -> Result<(AxisRange, AxisRange), TrackerError> {
    let field = |key: &str| -> Result<f64, TrackerError> {
        reply
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| TrackerError::MalformedMessage {
                exchange: "rotator",
                key: "rpc reply",
                reason: format!("missing or non-numeric field {key:?}"),
            })
    };
    Ok((
        AxisRange {
            min: field("az_min")?,
            max: field("az_max")?,
        },
        AxisRange {
            min: field("el_min")?,
            max: field("el_max")?,
        },
    ))
}
