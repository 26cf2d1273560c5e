// In-memory controller double shared by the engine and bridge tests.

#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use domestia_api::{Error, MAX_LEVEL, RelayState};

use crate::reconcile::RelayController;

/// A write the fake controller received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Write {
    On(u8),
    Off(u8),
    Level(u8, u8),
}

/// Relay `n` lives at `levels[n - 1]`. Writes update the levels the way the
/// hardware does, so a later poll observes them.
#[derive(Default)]
pub(crate) struct FakeController {
    levels: Mutex<Vec<u8>>,
    writes: Mutex<Vec<Write>>,
    fail_state: AtomicBool,
    fail_writes: AtomicBool,
    state_calls: AtomicUsize,
    state_delay: Option<Duration>,
}

impl FakeController {
    pub(crate) fn with_levels(levels: &[u8]) -> Self {
        Self {
            levels: Mutex::new(levels.to_vec()),
            ..Self::default()
        }
    }

    pub(crate) fn with_state_delay(mut self, delay: Duration) -> Self {
        self.state_delay = Some(delay);
        self
    }

    pub(crate) fn set_levels(&self, levels: &[u8]) {
        *self.levels.lock().unwrap() = levels.to_vec();
    }

    pub(crate) fn fail_state(&self, fail: bool) {
        self.fail_state.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn take_writes(&self) -> Vec<Write> {
        std::mem::take(&mut *self.writes.lock().unwrap())
    }

    pub(crate) fn state_calls(&self) -> usize {
        self.state_calls.load(Ordering::SeqCst)
    }

    fn record(&self, write: Write) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::UnexpectedAck {
                received: b"ERR".to_vec(),
            });
        }
        self.writes.lock().unwrap().push(write);

        let (relay, level) = match write {
            Write::On(relay) => (relay, None),
            Write::Off(relay) => (relay, Some(0)),
            Write::Level(relay, level) => (relay, Some(level.min(MAX_LEVEL))),
        };
        let mut levels = self.levels.lock().unwrap();
        if let Some(slot) = levels.get_mut(usize::from(relay) - 1) {
            match level {
                Some(level) => *slot = level,
                None if *slot == 0 => *slot = MAX_LEVEL,
                None => {}
            }
        }
        Ok(())
    }
}

impl RelayController for FakeController {
    fn relay_states(&self) -> impl Future<Output = Result<Vec<RelayState>, Error>> + Send {
        async move {
            self.state_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.state_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_state.load(Ordering::SeqCst) {
                return Err(Error::Timeout { timeout_ms: 1000 });
            }
            let levels = self.levels.lock().unwrap().clone();
            Ok(levels
                .into_iter()
                .zip(1..=u8::MAX)
                .map(|(level, relay)| RelayState { relay, level })
                .collect())
        }
    }

    fn turn_on(&self, relay: u8) -> impl Future<Output = Result<(), Error>> + Send {
        std::future::ready(self.record(Write::On(relay)))
    }

    fn turn_off(&self, relay: u8) -> impl Future<Output = Result<(), Error>> + Send {
        std::future::ready(self.record(Write::Off(relay)))
    }

    fn set_brightness(
        &self,
        relay: u8,
        level: u8,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        std::future::ready(self.record(Write::Level(relay, level)))
    }
}
