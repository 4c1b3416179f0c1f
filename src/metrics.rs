//! Process-wide counters for sessions, commands and event delivery.
use std::sync::atomic::{AtomicU64, Ordering};

static SESSIONS_OPENED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_CLOSED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_ACTIVE: AtomicU64 = AtomicU64::new(0);
static SESSIONS_PEAK: AtomicU64 = AtomicU64::new(0);
static COMMANDS_DISPATCHED: AtomicU64 = AtomicU64::new(0);
static EVENTS_DELIVERED: AtomicU64 = AtomicU64::new(0);
static EVENTS_DROPPED: AtomicU64 = AtomicU64::new(0);

pub fn record_session_open() {
    SESSIONS_OPENED.fetch_add(1, Ordering::Relaxed);
    let active = SESSIONS_ACTIVE.fetch_add(1, Ordering::Relaxed) + 1;
    SESSIONS_PEAK.fetch_max(active, Ordering::Relaxed);
}

pub fn record_session_close() {
    SESSIONS_CLOSED.fetch_add(1, Ordering::Relaxed);
    let _ = SESSIONS_ACTIVE.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
        Some(n.saturating_sub(1))
    });
}

/// Counts a session as open until dropped, so a session task that panics is still closed.
#[must_use]
pub struct SessionGuard(());

impl SessionGuard {
    pub fn open() -> Self {
        record_session_open();
        SessionGuard(())
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        record_session_close();
    }
}

pub fn inc_commands_dispatched() {
    COMMANDS_DISPATCHED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_events_delivered() {
    EVENTS_DELIVERED.fetch_add(1, Ordering::Relaxed);
}

pub fn add_events_dropped(count: u64) {
    EVENTS_DROPPED.fetch_add(count, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Snapshot {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub sessions_active: u64,
    pub sessions_peak: u64,
    pub commands_dispatched: u64,
    pub events_delivered: u64,
    pub events_dropped: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        sessions_opened: SESSIONS_OPENED.load(Ordering::Relaxed),
        sessions_closed: SESSIONS_CLOSED.load(Ordering::Relaxed),
        sessions_active: SESSIONS_ACTIVE.load(Ordering::Relaxed),
        sessions_peak: SESSIONS_PEAK.load(Ordering::Relaxed),
        commands_dispatched: COMMANDS_DISPATCHED.load(Ordering::Relaxed),
        events_delivered: EVENTS_DELIVERED.load(Ordering::Relaxed),
        events_dropped: EVENTS_DROPPED.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-wide and other tests touch them, so only check monotonic growth.
    #[test]
    fn session_open_close_moves_counters() {
        let before = snapshot();
        record_session_open();
        let during = snapshot();
        assert!(during.sessions_opened > before.sessions_opened);
        assert!(during.sessions_peak >= 1);

        record_session_close();
        let after = snapshot();
        assert!(after.sessions_closed > before.sessions_closed);
    }

    #[tokio::test]
    async fn panicking_session_still_counts_as_closed() {
        let before = snapshot().sessions_closed;
        let task = tokio::spawn(async {
            let _open = SessionGuard::open();
            panic!("session blew up");
        });
        assert!(task.await.unwrap_err().is_panic());
        assert!(snapshot().sessions_closed > before);
    }

    #[test]
    fn dropped_events_accumulate() {
        let before = snapshot().events_dropped;
        add_events_dropped(3);
        assert!(snapshot().events_dropped >= before + 3);
    }
}
