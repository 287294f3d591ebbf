use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Slot value meaning "no pending trigger". Also the operator's exit code.
pub const NO_TRIGGER: i64 = -1;

struct Slot {
    code: i64,
    set_at: Option<Instant>,
}

/// Single shared trigger slot.
///
/// The operator writes a code with [`set_pending`](Self::set_pending) (last write
/// wins, no queueing). Channels claim it with a check-and-clear under the slot
/// lock, so each pending code is consumed at most once. Writers notify a
/// condvar so blocked channels wake without spinning.
pub struct TriggerCoordinator {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl Default for TriggerCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerCoordinator {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot { code: NO_TRIGGER, set_at: None }),
            changed: Condvar::new(),
        }
    }

    /// Overwrite the slot and wake every waiting channel.
    pub fn set_pending(&self, code: i64) {
        let mut slot = self.slot.lock();
        slot.code = code;
        slot.set_at = if code == NO_TRIGGER { None } else { Some(Instant::now()) };
        drop(slot);
        self.changed.notify_all();
    }

    /// Currently pending code, or [`NO_TRIGGER`].
    pub fn pending(&self) -> i64 {
        self.slot.lock().code
    }

    /// Clear the slot if it holds `id`.
    pub fn try_consume(&self, id: i64) -> bool {
        self.try_consume_timed(id).is_some()
    }

    /// Like [`try_consume`](Self::try_consume), returning how long the code was pending.
    pub fn try_consume_timed(&self, id: i64) -> Option<Duration> {
        let mut slot = self.slot.lock();
        Self::claim(&mut slot, id)
    }

    /// Claim `id` if pending, otherwise sleep until the slot changes or `timeout`
    /// elapses and try once more.
    ///
    /// `None` means the caller should check for shutdown and wait again.
    pub fn wait_consume(&self, id: i64, timeout: Duration) -> Option<Duration> {
        let mut slot = self.slot.lock();
        if let Some(latency) = Self::claim(&mut slot, id) {
            return Some(latency);
        }
        self.changed.wait_for(&mut slot, timeout);
        Self::claim(&mut slot, id)
    }

    /// Wake every waiter without changing the slot.
    pub fn wake_all(&self) {
        self.changed.notify_all();
    }

    fn claim(slot: &mut Slot, id: i64) -> Option<Duration> {
        if id == NO_TRIGGER || slot.code != id {
            return None;
        }
        let latency = slot.set_at.map(|t| t.elapsed()).unwrap_or_default();
        slot.code = NO_TRIGGER;
        slot.set_at = None;
        Some(latency)
    }
}
