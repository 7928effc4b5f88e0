//! S5: tracker lifecycle end to end through the `OrbitTracker` supervisor.
//!
//! Uses a pass whose AOS has already happened and whose LOS is a few seconds away, so the
//! 2-second tick loop's full `WAITING -> TRACKING -> LOS -> WAITING` cycle completes in a few
//! wall-clock seconds instead of the minutes a real pass would take.

#![cfg(feature = "tracker")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hifitime::{Duration as HifiDuration, Epoch};

use skyrotor::bus::{MessageBus, PointingSample, TrackerEvent};
use skyrotor::ephemeris::{EphemerisAdapter, Pass, PassFilter, Position, Target, TargetKind};
use skyrotor::supervisor::OrbitTracker;

struct FakeTarget {
    name: String,
    pass: Mutex<Option<Pass>>,
}

#[async_trait::async_trait]
impl Target for FakeTarget {
    fn target_name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> TargetKind {
        TargetKind::Satellite
    }
    fn get_next_pass(&self) -> Option<Pass> {
        self.pass.lock().unwrap().clone()
    }
    async fn pos_at(&self, _t: Epoch, _accurate: bool) -> Position {
        Position {
            el: 30.0,
            az: 200.0,
            range: 700_000.0,
            range_rate: 5.0,
        }
    }
    async fn calculate_passes(&self) {}
}

struct FakeAdapter {
    pass: Pass,
}

#[async_trait::async_trait]
impl EphemerisAdapter for FakeAdapter {
    async fn get_satellite(&self, name: &str, _filter: PassFilter) -> Option<Box<dyn Target>> {
        Some(Box::new(FakeTarget {
            name: name.to_owned(),
            pass: Mutex::new(Some(self.pass.clone())),
        }))
    }
    async fn get_celestial_object(&self, _name: &str, _filter: PassFilter) -> Option<Box<dyn Target>> {
        None
    }
    fn is_celestial_name(&self, _name: &str) -> bool {
        false
    }
}

#[derive(Default)]
struct RecordingBus {
    events: Mutex<Vec<(&'static str, TrackerEvent)>>,
    pointing: Mutex<Vec<PointingSample>>,
}

#[async_trait::async_trait]
impl MessageBus for RecordingBus {
    async fn emit_event(&self, name: &'static str, event: TrackerEvent) {
        self.events.lock().unwrap().push((name, event));
    }
    async fn publish_pointing(&self, sample: PointingSample) {
        self.pointing.lock().unwrap().push(sample);
    }
    fn log(&self, _level: tracing::Level, _message: &str) {}
}

#[tokio::test]
async fn s5_tracker_runs_through_its_full_lifecycle() {
    let now = Epoch::now().unwrap();
    let pass = Pass {
        t_aos: now - HifiDuration::from_seconds(5.0),
        t_los: now + HifiDuration::from_seconds(3.0),
        max_elevation: Some(60.0),
    };
    let adapter = Arc::new(FakeAdapter { pass });
    let bus = Arc::new(RecordingBus::default());
    let mut supervisor = OrbitTracker::new(adapter, bus.clone(), true);

    supervisor
        .add_target(
            "ISS",
            vec!["az-el-1".to_owned()],
            PassFilter::default(),
            HifiDuration::from_seconds(60.0),
            None,
        )
        .await
        .unwrap();
    assert_eq!(supervisor.tracker_count(), 1);

    // Wait long enough for AOS (immediate), a tracking tick, and LOS (~3s in) to all fire.
    tokio::time::sleep(Duration::from_secs(8)).await;

    let names: Vec<&str> = bus.events.lock().unwrap().iter().map(|(n, _)| *n).collect();
    assert!(names.contains(&"next_pass"), "{names:?}");
    assert!(names.contains(&"aos"), "{names:?}");
    assert!(names.contains(&"los"), "{names:?}");
    assert!(!bus.pointing.lock().unwrap().is_empty());

    supervisor.remove_target("ISS", &["az-el-1".to_owned()]).await;
    assert_eq!(supervisor.tracker_count(), 0);
}
