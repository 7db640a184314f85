use foundation::math::precision::stable_total_cmp_f64;
use foundation::time::Time;

/// Deterministic one-shot timer queue.
///
/// Key properties:
/// - Total ordering on `(due, id)`: timers due at the same instant fire in
///   scheduling order.
/// - Cancellation does not perturb the order of remaining timers.
/// - Nothing fires on its own; the host drains due timers with `pop_due`.
///
/// Vec-backed: the subsystem only ever has a handful of live timers.

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug)]
struct Entry<T> {
    id: TimerId,
    due: Time,
    payload: T,
    canceled: bool,
}

impl<T> Entry<T> {
    fn fires_before(&self, other: &Self) -> bool {
        stable_total_cmp_f64(self.due.0, other.due.0)
            .then_with(|| self.id.cmp(&other.id))
            .is_lt()
    }
}

#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.canceled).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn schedule(&mut self, due: Time, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push(Entry {
            id,
            due,
            payload,
            canceled: false,
        });
        id
    }

    /// Returns `true` if a live timer was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id && !e.canceled) {
            entry.canceled = true;
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Earliest due time among live timers.
    pub fn next_due(&self) -> Option<Time> {
        self.earliest().map(|idx| self.entries[idx].due)
    }

    /// Pops the earliest timer whose due time is at or before `now`.
    pub fn pop_due(&mut self, now: Time) -> Option<(TimerId, T)> {
        self.entries.retain(|e| !e.canceled);
        let idx = self.earliest()?;
        if self.entries[idx].due > now {
            return None;
        }
        let entry = self.entries.swap_remove(idx);
        Some((entry.id, entry.payload))
    }

    fn earliest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.canceled {
                continue;
            }
            match best {
                None => best = Some(idx),
                Some(b) => {
                    if entry.fires_before(&self.entries[b]) {
                        best = Some(idx);
                    }
                }
            }
        }
        best
    }
}
