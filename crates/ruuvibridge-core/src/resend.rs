//! Discovery resend policy.
//!
//! Discovery metadata is cheap to republish and the hub's knowledge of it is
//! unreliable after any reconnect, so the policy favors redundant
//! republishing over stale dashboards: a wall-clock interval and two external
//! triggers each force a full resend, without backoff or coalescing.
//! Whichever fires first wins, and every firing resets the interval clock.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::info;

use crate::discovery::DiscoveryCache;

/// Default interval between periodic discovery resends.
pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_secs(3600);

/// External triggers that force an immediate full resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalEvent {
    /// A broker endpoint completed a (re)connection; any retained discovery
    /// state it held may be gone.
    BrokerReconnected,
    /// The hub announced it just came online on its status topic.
    HubLivenessOnline,
}

/// Wall-clock state behind the scheduler's mutex.
#[derive(Debug)]
struct ResendState {
    last_invalidation: Instant,
}

/// Decides when the discovery cache must be invalidated wholesale.
///
/// `tick` is cooperative: the pipeline calls it once per processed reading
/// with the current instant, so no dedicated timer task is needed. External
/// events invalidate unconditionally. Both paths reset the interval clock,
/// and the last-invalidation time only ever moves forward.
pub struct ResendScheduler {
    cache: Arc<DiscoveryCache>,
    interval: Duration,
    state: Mutex<ResendState>,
}

impl ResendScheduler {
    /// Create a scheduler for `cache` with the given resend interval.
    ///
    /// The interval clock starts at construction; the cache starts empty
    /// anyway, so nothing is lost by not firing immediately.
    pub fn new(cache: Arc<DiscoveryCache>, interval: Duration) -> Self {
        Self {
            cache,
            interval,
            state: Mutex::new(ResendState {
                last_invalidation: Instant::now(),
            }),
        }
    }

    /// Periodic check, called once per processed reading.
    ///
    /// Invalidates the cache iff strictly more than the configured interval
    /// has elapsed since the last invalidation (elapsed == interval does not
    /// fire). Returns whether an invalidation fired.
    pub fn tick(&self, now: Instant) -> bool {
        {
            let mut state = self.state.lock().expect("resend state lock poisoned");
            if now.saturating_duration_since(state.last_invalidation) <= self.interval {
                return false;
            }
            state.last_invalidation = now;
        }
        info!(
            "periodic discovery resend triggered (interval: {} seconds)",
            self.interval.as_secs()
        );
        self.cache.invalidate_all();
        true
    }

    /// Event-driven invalidation: always fires, regardless of elapsed time,
    /// and resets the interval clock to `now`.
    pub fn on_event(&self, event: ExternalEvent, now: Instant) {
        {
            let mut state = self.state.lock().expect("resend state lock poisoned");
            // Only forward; `now` captured before the lock cannot rewind the
            // clock past a tick that won the race.
            state.last_invalidation = state.last_invalidation.max(now);
        }
        match event {
            ExternalEvent::BrokerReconnected => {
                info!("broker reconnected, clearing discovery cache to force resend");
            }
            ExternalEvent::HubLivenessOnline => {
                info!("hub announced online status, forcing discovery resend");
            }
        }
        self.cache.invalidate_all();
    }

    /// The configured resend interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(interval: Duration) -> (Arc<DiscoveryCache>, ResendScheduler, Instant) {
        let cache = Arc::new(DiscoveryCache::new());
        // Capture t0 before construction so last_invalidation >= t0 and the
        // boundary assertions below cannot race the constructor.
        let t0 = Instant::now();
        let scheduler = ResendScheduler::new(Arc::clone(&cache), interval);
        (cache, scheduler, t0)
    }

    #[test]
    fn test_tick_within_interval_does_not_fire() {
        let (cache, scheduler, t0) = scheduler(Duration::from_secs(3600));
        cache.mark_published("living_room");

        assert!(!scheduler.tick(t0 + Duration::from_secs(100)));
        assert!(!cache.should_publish("living_room"));
    }

    #[test]
    fn test_tick_at_exact_interval_does_not_fire() {
        let (_, scheduler, t0) = scheduler(Duration::from_secs(3600));
        assert!(!scheduler.tick(t0 + Duration::from_secs(3600)));
    }

    #[test]
    fn test_tick_past_interval_fires_once() {
        let (cache, scheduler, t0) = scheduler(Duration::from_secs(3600));
        cache.mark_published("living_room");

        let late = t0 + Duration::from_secs(3700);
        assert!(scheduler.tick(late));
        assert!(cache.should_publish("living_room"));

        // The clock was reset: an immediate second tick does nothing.
        assert!(!scheduler.tick(late + Duration::from_secs(1)));
    }

    #[test]
    fn test_event_always_invalidates() {
        let (cache, scheduler, t0) = scheduler(Duration::from_secs(3600));
        cache.mark_published("living_room");

        scheduler.on_event(ExternalEvent::BrokerReconnected, t0 + Duration::from_secs(5));
        assert!(cache.should_publish("living_room"));

        cache.mark_published("living_room");
        scheduler.on_event(ExternalEvent::HubLivenessOnline, t0 + Duration::from_secs(6));
        assert!(cache.should_publish("living_room"));
    }

    #[test]
    fn test_event_resets_interval_clock() {
        let (_, scheduler, t0) = scheduler(Duration::from_secs(3600));

        let event_at = t0 + Duration::from_secs(3601);
        scheduler.on_event(ExternalEvent::HubLivenessOnline, event_at);

        // Exactly one interval after the event: boundary, no fire.
        assert!(!scheduler.tick(event_at + Duration::from_secs(3600)));
        // Strictly past it: fires.
        assert!(scheduler.tick(event_at + Duration::from_secs(3601)));
    }
}
