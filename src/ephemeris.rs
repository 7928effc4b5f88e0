//! Target/pass/position types and the `EphemerisAdapter` trait that abstracts the external
//! satellite/celestial ephemeris provider.
//!
//! Nothing in this module propagates orbits itself; it only defines the shape the tracker
//! consumes. Embedders inject a concrete `EphemerisAdapter` backed by whatever TLE/analytic
//! ephemeris library they already run.

use async_trait::async_trait;
use hifitime::Epoch;

/// A topocentric position prediction for a target at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Elevation above the local horizon, degrees.
    pub el: f64,
    /// Azimuth, degrees, measured east of north, not yet wrapped into any particular branch.
    pub az: f64,
    /// Slant range, metres.
    pub range: f64,
    /// Range rate (positive receding), metres per second.
    pub range_rate: f64,
}

impl Position {
    /// Returns a copy of this position with standard-atmosphere refraction applied to `el`.
    ///
    /// Uses Saemundsson's approximation for the true-to-apparent altitude correction (the same
    /// "standard" refraction model astronomical ephemeris libraries offer as an `altaz`
    /// variant), which is accurate to a few arcseconds above 15 degrees and degrades gracefully
    /// toward the horizon. Refraction acts purely in the vertical plane, so `az` is unchanged.
    pub fn with_standard_refraction(self) -> Position {
        let h = self.el.max(-1.0);
        let r_arcmin = 1.02 / (h + 10.3 / (h + 5.11)).to_radians().tan();
        Position {
            el: self.el + r_arcmin / 60.0,
            ..self
        }
    }
}

/// A plausible future visibility window for a target, as produced by an ephemeris adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    /// Acquisition of signal.
    pub t_aos: Epoch,
    /// Loss of signal.
    pub t_los: Epoch,
    /// Maximum elevation reached during the pass, degrees, if known.
    pub max_elevation: Option<f64>,
}

impl Pass {
    /// Flattens this pass into the key/value pairs the original event payloads carry alongside
    /// `target`/`rotators` (e.g. for `event.next_pass`/`event.preaos`).
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("t_aos", self.t_aos.to_string()),
            ("t_los", self.t_los.to_string()),
        ];
        if let Some(max_el) = self.max_elevation {
            fields.push(("max_elevation", max_el.to_string()));
        }
        fields
    }
}

/// Whether a resolved target is a two-line-element satellite or an analytic celestial object.
///
/// The only behavioral difference this crate cares about is the default for `high_accuracy`
/// (true for celestial objects) — everything else is opaque beyond the [`Target`] trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A TLE-propagated spacecraft.
    Satellite,
    /// An analytically-propagated celestial body (Sun, Moon, a fixed RA/Dec, …).
    Celestial,
}

/// A resolved tracking target: a spacecraft or celestial object the supervisor has bound a
/// tracker to.
#[async_trait]
pub trait Target: Send + Sync {
    /// The name this target was resolved under.
    fn target_name(&self) -> &str;

    /// Whether this target is a satellite or a celestial object.
    fn kind(&self) -> TargetKind;

    /// The next upcoming (or currently ongoing) pass, if the adapter has one cached.
    fn get_next_pass(&self) -> Option<Pass>;

    /// Predicts this target's topocentric position at `t`.
    ///
    /// `accurate` requests whatever higher-fidelity propagation the adapter supports (e.g.
    /// polar motion, precise ephemeris); adapters that only offer one fidelity level may ignore
    /// it.
    async fn pos_at(&self, t: Epoch, accurate: bool) -> Position;

    /// Recomputes the adapter's internal pass schedule. Called once after LOS, when the next
    /// pass must be (re)discovered.
    ///
    /// This is async rather than a side-effecting `get_next_pass` so that a slow adapter (one
    /// that hits a network ephemeris service) does not block the tracker's tick loop; adapters
    /// that need to bound their own latency should do so internally (e.g. with caching), not by
    /// making the tracker responsible for it.
    async fn calculate_passes(&self);
}

/// Filters narrowing which pass `get_satellite`/`get_celestial_object` should resolve around.
///
/// All fields are optional; an adapter that ignores a filter it does not support is conforming
/// behavior, matching the original's note that only `target_name` is strictly required and the
/// rest only refine which AOS/LOS the adapter reports.
#[derive(Debug, Clone, Default)]
pub struct PassFilter {
    /// Earliest time to consider.
    pub start_time: Option<Epoch>,
    /// Latest time to consider.
    pub end_time: Option<Epoch>,
    /// Minimum elevation, degrees, for a pass to count.
    pub min_elevation: f64,
    /// Minimum of the pass's maximum elevation, degrees.
    pub min_max_elevation: f64,
    /// Reject passes where the sun is above this elevation, degrees.
    pub sun_max_elevation: Option<f64>,
    /// Require (or reject, if `Some(false)`) the target being sunlit.
    pub sunlit: Option<bool>,
    /// Include a pass already in progress at resolution time.
    pub partial_last_pass: bool,
}

/// Abstracts the external satellite/celestial ephemeris provider.
///
/// A concrete adapter wraps whatever TLE propagation and almanac library the embedding
/// application already depends on; this crate never parses TLEs or propagates orbits itself.
#[async_trait]
pub trait EphemerisAdapter: Send + Sync {
    /// Resolves `name` to a satellite target, applying `filter`. Returns `None` if the name is
    /// not a known spacecraft.
    async fn get_satellite(
        &self,
        name: &str,
        filter: PassFilter,
    ) -> Option<Box<dyn Target>>;

    /// Resolves `name` to a celestial-object target, applying `filter`. Returns `None` if the
    /// name does not name a supported celestial body.
    async fn get_celestial_object(
        &self,
        name: &str,
        filter: PassFilter,
    ) -> Option<Box<dyn Target>>;

    /// Whether `name` should be resolved through [`EphemerisAdapter::get_celestial_object`]
    /// rather than [`EphemerisAdapter::get_satellite`].
    ///
    /// Mirrors the original's `CelestialObject.is_class_of(name)` class check: a cheap,
    /// synchronous name-based routing decision made before any lookup is attempted.
    fn is_celestial_name(&self, name: &str) -> bool;
}
