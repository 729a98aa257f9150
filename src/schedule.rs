//! Timer bookkeeping for the rotation loop.
//!
//! Auto-advance, the daily refresh and the periodic restart all live in one
//! [`TimerQueue`] owned by the loop. A fired task that wants to recur
//! enqueues its own successor.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::time::Instant;

/// Identifies one scheduled entry; used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Priority queue of `(deadline, task)` pairs.
///
/// Ties fire in scheduling order. Cancellation is lazy: the heap slot is
/// discarded when it reaches the top.
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    tasks: HashMap<u64, T>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            tasks: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn schedule_at(&mut self, deadline: Instant, task: T) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Reverse((deadline, id)));
        self.tasks.insert(id, task);
        TimerHandle(id)
    }

    pub fn schedule_in(&mut self, delay: Duration, task: T) -> TimerHandle {
        self.schedule_at(Instant::now() + delay, task)
    }

    /// Remove a pending entry. `None` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        self.tasks.remove(&handle.0)
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.tasks.contains_key(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Pop the earliest entry if its deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerHandle, T)> {
        self.discard_cancelled();
        let Reverse((deadline, id)) = *self.heap.peek()?;
        if deadline > now {
            return None;
        }
        self.heap.pop();
        self.tasks.remove(&id).map(|task| (TimerHandle(id), task))
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse((_, id))) = self.heap.peek() {
            if self.tasks.contains_key(id) {
                break;
            }
            self.heap.pop();
        }
    }
}

/// First occurrence of wall-clock `at` strictly after `after`, in `after`'s zone.
///
/// A local time skipped by a DST gap moves to the next day; an ambiguous
/// one resolves to the earlier instant.
pub fn next_daily_occurrence<Z: TimeZone>(after: &DateTime<Z>, at: NaiveTime) -> DateTime<Z> {
    let zone = after.timezone();
    let mut date = after.date_naive();
    for _ in 0..4 {
        if let Some(candidate) = zone.from_local_datetime(&date.and_time(at)).earliest() {
            if candidate > *after {
                return candidate;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    after.clone() + TimeDelta::days(1)
}

/// Next refresh instant in UTC, using `zone` or the host local zone.
pub fn next_refresh_after(after: DateTime<Utc>, at: NaiveTime, zone: Option<Tz>) -> DateTime<Utc> {
    match zone {
        Some(tz) => next_daily_occurrence(&after.with_timezone(&tz), at).with_timezone(&Utc),
        None => next_daily_occurrence(&after.with_timezone(&Local), at).with_timezone(&Utc),
    }
}

/// Non-negative wait from `now` until `target`.
pub fn delay_until(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}
