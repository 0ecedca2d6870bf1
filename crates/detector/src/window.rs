//! Time-bounded event retention
//!
//! Backing store for chronology reconstruction and the window-scoped
//! round-trip scan. Events are kept in arrival order; pruning walks from the
//! front, so an event that arrives out of order can outlive its horizon until
//! everything ahead of it has aged out.

use std::collections::VecDeque;
use vigil_core::{Event, Timestamp, seconds_between};

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    horizon_secs: f64,
    events: VecDeque<Event>,
    newest: Option<Timestamp>,
}

impl SlidingWindow {
    pub fn new(horizon_secs: f64) -> Self {
        Self {
            horizon_secs,
            events: VecDeque::new(),
            newest: None,
        }
    }

    /// Append in arrival order
    pub fn push(&mut self, event: Event) {
        self.newest = Some(match self.newest {
            Some(newest) if newest >= event.timestamp => newest,
            _ => event.timestamp,
        });
        self.events.push_back(event);
    }

    /// Drop events from the front whose age relative to `current` exceeds
    /// the horizon. Returns the number removed.
    pub fn prune(&mut self, current: Timestamp) -> usize {
        let mut removed = 0;
        while let Some(front) = self.events.front() {
            if seconds_between(front.timestamp, current) > self.horizon_secs {
                self.events.pop_front();
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    /// Latest timestamp pushed so far
    pub fn newest(&self) -> Option<Timestamp> {
        self.newest
    }

    /// Ordered view of the retained events, without removing them
    pub fn snapshot(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn horizon_secs(&self) -> f64 {
        self.horizon_secs
    }
}
