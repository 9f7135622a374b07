//! Detection result channel.
//!
//! Results flow from the inference plugin to the overlay through one of two
//! channel flavors hidden behind the `DetectionSource` trait:
//!
//! - **push** (`EventStreamSource`): the plugin emits a named event on the
//!   shared `DetectionFeed`; a subscription captures batches as they land.
//! - **pull** (`PollingSource`): a synchronous accessor is polled on a fixed
//!   interval.
//!
//! Both flavors write into a `LatestCell`, the single latest-batch slot the
//! renderer reads. The cell has exactly one writer (the channel callback or
//! the poll) and one reader (the draw tick); superseded batches are
//! overwritten, never queued.
//!
//! The channel MUST NOT:
//! - Fail the draw loop: a bad payload or a failing accessor degrades to an
//!   empty batch for that cycle
//! - Deliver to a released subscription: release happens exactly once, on
//!   disable or drop, whichever comes first

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::Value;

use super::batch::{normalize_detections, Detection};

/// Default poll spacing for the pull flavor, in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 200;

/// Payload field carrying the detection array in push events.
pub const DETECTIONS_FIELD: &str = "detections";

// ----------------------------------------------------------------------------
// LatestCell: single latest-batch slot
// ----------------------------------------------------------------------------

/// The latest batch plus its version, as read by the draw tick.
///
/// Version 0 means "nothing published since the last reset"; every publish
/// bumps the version, even for identical content, so the renderer's skip
/// check keys purely on the counter.
#[derive(Clone, Debug)]
pub struct BatchSnapshot {
    pub detections: Arc<[Detection]>,
    pub version: u64,
}

impl BatchSnapshot {
    pub fn empty() -> Self {
        Self {
            detections: Arc::from(Vec::new()),
            version: 0,
        }
    }
}

/// Mutex-guarded latest-batch slot.
///
/// Single writer, single reader in steady state; the lock exists because the
/// push callback may run on the plugin's execution context while the draw
/// tick reads from the render loop.
pub struct LatestCell {
    inner: Mutex<CellState>,
}

struct CellState {
    detections: Arc<[Detection]>,
    version: u64,
}

impl LatestCell {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CellState {
                detections: Arc::from(Vec::new()),
                version: 0,
            }),
        }
    }

    /// Replace the batch and bump the version.
    pub fn publish(&self, detections: Vec<Detection>) {
        match self.inner.lock() {
            Ok(mut state) => {
                state.version += 1;
                state.detections = Arc::from(detections);
            }
            Err(_) => log::warn!("LatestCell: lock poisoned; batch dropped"),
        }
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        match self.inner.lock() {
            Ok(state) => BatchSnapshot {
                detections: Arc::clone(&state.detections),
                version: state.version,
            },
            Err(_) => BatchSnapshot::empty(),
        }
    }

    /// Back to "nothing published": empty batch, version 0.
    ///
    /// Called on every enable transition so a stale batch can never replay
    /// after re-enable.
    pub fn reset(&self) {
        match self.inner.lock() {
            Ok(mut state) => {
                state.version = 0;
                state.detections = Arc::from(Vec::new());
            }
            Err(_) => log::warn!("LatestCell: lock poisoned; reset skipped"),
        }
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }
}

impl Default for LatestCell {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// DetectionFeed: named-event fan-out
// ----------------------------------------------------------------------------

type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Named-event fan-out between plugins and overlays.
///
/// Plugins emit; overlays subscribe while enabled. One feed is shared per
/// pipeline; subscriptions are scoped to an event name.
pub struct DetectionFeed {
    inner: Mutex<FeedState>,
}

#[derive(Default)]
struct FeedState {
    next_id: u64,
    listeners: HashMap<String, Vec<Listener>>,
}

struct Listener {
    id: u64,
    callback: EventCallback,
}

impl DetectionFeed {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FeedState::default()),
        }
    }

    /// Subscribe to an event. The subscription is released on `release()` or
    /// drop, exactly once.
    pub fn subscribe(
        self: &Arc<Self>,
        event: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let id = match self.inner.lock() {
            Ok(mut state) => {
                state.next_id += 1;
                let id = state.next_id;
                state.listeners.entry(event.to_string()).or_default().push(Listener {
                    id,
                    callback: Arc::new(callback),
                });
                id
            }
            Err(_) => {
                log::warn!("DetectionFeed: lock poisoned; subscription inert");
                0
            }
        };
        Subscription {
            feed: Arc::clone(self),
            event: event.to_string(),
            id: Some(id),
        }
    }

    /// Deliver a payload to every listener on `event`.
    ///
    /// Callbacks run outside the registry lock, so a callback may subscribe
    /// or release without deadlocking.
    pub fn emit(&self, event: &str, payload: Value) {
        let callbacks: Vec<EventCallback> = match self.inner.lock() {
            Ok(state) => state
                .listeners
                .get(event)
                .map(|listeners| listeners.iter().map(|l| Arc::clone(&l.callback)).collect())
                .unwrap_or_default(),
            Err(_) => {
                log::warn!("DetectionFeed: lock poisoned; event '{}' dropped", event);
                Vec::new()
            }
        };
        for callback in callbacks {
            callback(&payload);
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        match self.inner.lock() {
            Ok(state) => state.listeners.get(event).map_or(0, Vec::len),
            Err(_) => 0,
        }
    }

    fn unsubscribe(&self, event: &str, id: u64) {
        if let Ok(mut state) = self.inner.lock() {
            if let Some(listeners) = state.listeners.get_mut(event) {
                listeners.retain(|listener| listener.id != id);
            }
        }
    }
}

impl Default for DetectionFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one active event subscription.
pub struct Subscription {
    feed: Arc<DetectionFeed>,
    event: String,
    id: Option<u64>,
}

impl Subscription {
    /// Release the subscription. Safe to call more than once; only the first
    /// call detaches the listener.
    pub fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.feed.unsubscribe(&self.event, id);
        }
    }

    pub fn is_released(&self) -> bool {
        self.id.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

// ----------------------------------------------------------------------------
// DetectionSource: push/pull duality behind one seam
// ----------------------------------------------------------------------------

/// Synchronous accessor for the pull flavor.
///
/// Returns the latest raw payload, `None` when the plugin has nothing yet.
/// Errors are the accessor's problem to describe and the poller's problem to
/// survive.
pub type DetectionAccessor = Arc<dyn Fn() -> Result<Option<Value>> + Send + Sync>;

/// The renderer's one view of the channel: latest batch + version, with
/// enable/disable lifecycle hooks.
pub trait DetectionSource: Send {
    /// Arm the channel. Called on each enable transition; resets the latest
    /// batch so nothing stale can replay.
    fn on_enabled(&mut self);

    /// Tear the channel down. Called on disable and on unmount.
    fn on_disabled(&mut self);

    /// Give the channel a chance to ingest (the pull flavor polls here; the
    /// push flavor ingests via its subscription and ignores this).
    fn pump(&mut self, now: Instant);

    /// Latest batch + version.
    fn snapshot(&self) -> BatchSnapshot;
}

// ----------------------------------------------------------------------------
// EventStreamSource (push)
// ----------------------------------------------------------------------------

/// Push-flavor source: one subscription per enabled period on a shared feed.
pub struct EventStreamSource {
    feed: Arc<DetectionFeed>,
    event: String,
    cell: Arc<LatestCell>,
    subscription: Option<Subscription>,
}

impl EventStreamSource {
    pub fn new(feed: Arc<DetectionFeed>, event: &str) -> Self {
        Self {
            feed,
            event: event.to_string(),
            cell: Arc::new(LatestCell::new()),
            subscription: None,
        }
    }
}

impl DetectionSource for EventStreamSource {
    fn on_enabled(&mut self) {
        self.cell.reset();
        if self.subscription.is_none() {
            let cell = Arc::clone(&self.cell);
            self.subscription = Some(self.feed.subscribe(&self.event, move |payload| {
                // Missing or malformed `detections` degrades to an empty
                // batch; the version still bumps so the renderer clears.
                let batch = payload
                    .get(DETECTIONS_FIELD)
                    .map(normalize_detections)
                    .unwrap_or_default();
                cell.publish(batch);
            }));
            log::info!("EventStreamSource: subscribed to '{}'", self.event);
        }
    }

    fn on_disabled(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.release();
            log::info!("EventStreamSource: released '{}'", self.event);
        }
        self.cell.reset();
    }

    fn pump(&mut self, _now: Instant) {}

    fn snapshot(&self) -> BatchSnapshot {
        self.cell.snapshot()
    }
}

impl Drop for EventStreamSource {
    fn drop(&mut self) {
        self.on_disabled();
    }
}

// ----------------------------------------------------------------------------
// PollingSource (pull)
// ----------------------------------------------------------------------------

/// Pull-flavor source: polls a synchronous accessor on a fixed interval
/// while enabled.
///
/// An absent accessor means the plugin is unavailable; that is checked once
/// per enable transition and the overlay stays empty, without per-frame
/// retries. A failing accessor publishes an empty batch and polling stays on
/// schedule.
pub struct PollingSource {
    accessor: Option<DetectionAccessor>,
    interval: Duration,
    cell: LatestCell,
    enabled: bool,
    next_poll: Option<Instant>,
}

impl PollingSource {
    pub fn new(accessor: Option<DetectionAccessor>, interval: Duration) -> Self {
        Self {
            accessor,
            interval,
            cell: LatestCell::new(),
            enabled: false,
            next_poll: None,
        }
    }
}

impl DetectionSource for PollingSource {
    fn on_enabled(&mut self) {
        self.cell.reset();
        self.enabled = true;
        self.next_poll = None;
        if self.accessor.is_none() {
            log::info!("PollingSource: no accessor available; overlay stays empty");
        }
    }

    fn on_disabled(&mut self) {
        self.enabled = false;
        self.next_poll = None;
        self.cell.reset();
    }

    fn pump(&mut self, now: Instant) {
        if !self.enabled {
            return;
        }
        let Some(accessor) = self.accessor.as_ref() else {
            return;
        };
        if let Some(due) = self.next_poll {
            if now < due {
                return;
            }
        }
        self.next_poll = Some(now + self.interval);

        let batch = match accessor() {
            Ok(Some(value)) => normalize_detections(&value),
            Ok(None) => Vec::new(),
            Err(err) => {
                log::warn!("PollingSource: accessor failed: {:#}", err);
                Vec::new()
            }
        };
        self.cell.publish(batch);
    }

    fn snapshot(&self) -> BatchSnapshot {
        self.cell.snapshot()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn example_payload() -> Value {
        json!({ "detections": [{"x1": 100, "y1": 50, "x2": 500, "y2": 300}] })
    }

    #[test]
    fn publish_bumps_version_and_replaces_batch() {
        let cell = LatestCell::new();
        assert_eq!(cell.version(), 0);

        cell.publish(vec![Detection {
            x1: 1.0,
            y1: 2.0,
            x2: 3.0,
            y2: 4.0,
        }]);
        let first = cell.snapshot();
        assert_eq!(first.version, 1);
        assert_eq!(first.detections.len(), 1);

        cell.publish(Vec::new());
        let second = cell.snapshot();
        assert_eq!(second.version, 2);
        assert!(second.detections.is_empty());

        // The earlier snapshot is unaffected by later publishes.
        assert_eq!(first.detections.len(), 1);
    }

    #[test]
    fn reset_returns_cell_to_the_unpublished_state() {
        let cell = LatestCell::new();
        cell.publish(vec![Detection {
            x1: 1.0,
            y1: 1.0,
            x2: 2.0,
            y2: 2.0,
        }]);

        cell.reset();
        let snapshot = cell.snapshot();
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.detections.is_empty());
    }

    #[test]
    fn subscription_release_is_idempotent() {
        let feed = Arc::new(DetectionFeed::new());
        let mut subscription = feed.subscribe("onYoloDetections", |_| {});
        assert_eq!(feed.listener_count("onYoloDetections"), 1);

        subscription.release();
        subscription.release();
        assert!(subscription.is_released());
        assert_eq!(feed.listener_count("onYoloDetections"), 0);
    }

    #[test]
    fn dropping_a_subscription_releases_it() {
        let feed = Arc::new(DetectionFeed::new());
        {
            let _subscription = feed.subscribe("onYoloDetections", |_| {});
            assert_eq!(feed.listener_count("onYoloDetections"), 1);
        }
        assert_eq!(feed.listener_count("onYoloDetections"), 0);
    }

    #[test]
    fn emit_reaches_only_matching_event_listeners() {
        let feed = Arc::new(DetectionFeed::new());
        let hits = Arc::new(Mutex::new(0u32));

        let hits_clone = Arc::clone(&hits);
        let _subscription = feed.subscribe("onYoloDetections", move |_| {
            *hits_clone.lock().unwrap() += 1;
        });
        let _other = feed.subscribe("onOtherEvent", |_| panic!("wrong event delivered"));

        feed.emit("onYoloDetections", example_payload());
        feed.emit("onYoloDetections", example_payload());

        assert_eq!(*hits.lock().unwrap(), 2);
    }

    #[test]
    fn event_stream_source_captures_batches_while_enabled() {
        let feed = Arc::new(DetectionFeed::new());
        let mut source = EventStreamSource::new(Arc::clone(&feed), "onYoloDetections");

        source.on_enabled();
        feed.emit("onYoloDetections", example_payload());

        let snapshot = source.snapshot();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.detections.len(), 1);
        assert_eq!(snapshot.detections[0].x1, 100.0);
    }

    #[test]
    fn event_stream_source_ignores_events_after_disable() {
        let feed = Arc::new(DetectionFeed::new());
        let mut source = EventStreamSource::new(Arc::clone(&feed), "onYoloDetections");

        source.on_enabled();
        feed.emit("onYoloDetections", example_payload());
        source.on_disabled();
        assert_eq!(feed.listener_count("onYoloDetections"), 0);

        feed.emit("onYoloDetections", example_payload());
        let snapshot = source.snapshot();
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.detections.is_empty());
    }

    #[test]
    fn event_stream_source_reenables_with_a_fresh_slate() {
        let feed = Arc::new(DetectionFeed::new());
        let mut source = EventStreamSource::new(Arc::clone(&feed), "onYoloDetections");

        source.on_enabled();
        feed.emit("onYoloDetections", example_payload());
        source.on_disabled();
        source.on_enabled();

        // Prior batch must not replay; only a new emission repopulates.
        assert_eq!(source.snapshot().version, 0);
        assert_eq!(feed.listener_count("onYoloDetections"), 1);

        feed.emit("onYoloDetections", example_payload());
        assert_eq!(source.snapshot().version, 1);
    }

    #[test]
    fn event_payload_without_detections_field_clears_the_batch() {
        let feed = Arc::new(DetectionFeed::new());
        let mut source = EventStreamSource::new(Arc::clone(&feed), "onYoloDetections");

        source.on_enabled();
        feed.emit("onYoloDetections", example_payload());
        feed.emit("onYoloDetections", json!({ "unexpected": true }));

        let snapshot = source.snapshot();
        assert_eq!(snapshot.version, 2);
        assert!(snapshot.detections.is_empty());
    }

    #[test]
    fn polling_source_polls_on_the_configured_interval() {
        let accessor: DetectionAccessor =
            Arc::new(|| Ok(Some(json!([{"x1": 0, "y1": 0, "x2": 10, "y2": 10}]))));
        let mut source = PollingSource::new(Some(accessor), Duration::from_millis(200));
        let start = Instant::now();

        source.on_enabled();
        source.pump(start);
        assert_eq!(source.snapshot().version, 1);

        // Within the interval: no new poll.
        source.pump(start + Duration::from_millis(100));
        assert_eq!(source.snapshot().version, 1);

        source.pump(start + Duration::from_millis(200));
        assert_eq!(source.snapshot().version, 2);
    }

    #[test]
    fn polling_source_survives_accessor_errors() {
        let calls = Arc::new(Mutex::new(0u32));
        let calls_clone = Arc::clone(&calls);
        let accessor: DetectionAccessor = Arc::new(move || {
            let mut calls = calls_clone.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Err(anyhow::anyhow!("plugin hiccup"))
            } else {
                Ok(Some(json!([{"x1": 1, "y1": 1, "x2": 2, "y2": 2}])))
            }
        });
        let mut source = PollingSource::new(Some(accessor), Duration::from_millis(200));
        let start = Instant::now();

        source.on_enabled();
        source.pump(start);
        let after_error = source.snapshot();
        assert_eq!(after_error.version, 1);
        assert!(after_error.detections.is_empty());

        // Polling continued on schedule and recovered.
        source.pump(start + Duration::from_millis(200));
        let recovered = source.snapshot();
        assert_eq!(recovered.version, 2);
        assert_eq!(recovered.detections.len(), 1);
    }

    #[test]
    fn polling_source_without_accessor_stays_empty() {
        let mut source = PollingSource::new(None, Duration::from_millis(200));
        let start = Instant::now();

        source.on_enabled();
        source.pump(start);
        source.pump(start + Duration::from_secs(1));

        assert_eq!(source.snapshot().version, 0);
    }

    #[test]
    fn polling_source_does_not_poll_while_disabled() {
        let accessor: DetectionAccessor = Arc::new(|| Ok(Some(json!([]))));
        let mut source = PollingSource::new(Some(accessor), Duration::from_millis(200));
        let start = Instant::now();

        source.on_enabled();
        source.pump(start);
        assert_eq!(source.snapshot().version, 1);

        source.on_disabled();
        source.pump(start + Duration::from_secs(1));
        assert_eq!(source.snapshot().version, 0);
    }
}
