use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::warn;

pub(crate) const DEFAULT_BURST_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
struct PressState {
    last_time: Instant,
    count: u32,
}

/// Counts consecutive presses of the same event.
///
/// A press that follows the previous one for its event by at most `window`
/// continues the burst, anything later starts a new burst at 1. Presses of
/// different events never affect each other.
#[derive(Debug)]
pub(crate) struct PressCounter {
    window: Duration,
    presses: Mutex<HashMap<String, PressState>>,
}

impl PressCounter {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            presses: Mutex::new(HashMap::new()),
        }
    }

    /// Records a press of `event` at `now` and returns its position in the current burst.
    ///
    /// Timestamps must come from a single monotonic clock. One that is earlier than
    /// the previous press of the same event is treated as a zero gap.
    pub(crate) fn record(&self, event: &str, now: Instant) -> u32 {
        let mut presses = self.lock();

        let state = match presses.entry(event.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(PressState {
                    last_time: now,
                    count: 1,
                });
                return 1;
            }
        };

        let gap = now.checked_duration_since(state.last_time).unwrap_or_else(|| {
            warn!(event, "press timestamp went backwards, counting it as a zero gap");
            Duration::from_millis(0)
        });

        if gap > self.window {
            state.count = 1;
        } else {
            state.count += 1;
        }
        state.last_time = now;

        state.count
    }

    // The table is updated in a single step under the lock, so a poisoned
    // guard still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PressState>> {
        self.presses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PressCounter {
    fn default() -> Self {
        Self::new(DEFAULT_BURST_WINDOW)
    }
}
