//! One-shot timers feeding the control loop.
//!
//! Each [`AlarmTag`] has at most one pending timer; scheduling a tag again
//! replaces the previous one, and cancelling a tag with nothing pending is a
//! no-op.

use std::collections::HashMap;
use std::time::Duration;

use log::trace;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::events::{AlarmTag, Event};

pub trait AlarmService: Send {
    fn schedule(&mut self, tag: AlarmTag, delay: Duration);
    fn cancel(&mut self, tag: AlarmTag);
    fn is_pending(&self, tag: AlarmTag) -> bool;
}

/// Timer service backed by spawned tokio sleep tasks. Firing posts an
/// `Event::Alarm` onto the control loop's channel.
pub struct TokioAlarmService {
    events: UnboundedSender<Event>,
    pending: HashMap<&'static str, JoinHandle<()>>,
}

impl TokioAlarmService {
    pub fn new(events: UnboundedSender<Event>) -> Self {
        TokioAlarmService {
            events,
            pending: HashMap::new(),
        }
    }
}

impl AlarmService for TokioAlarmService {
    fn schedule(&mut self, tag: AlarmTag, delay: Duration) {
        if let Some(handle) = self.pending.remove(tag.name()) {
            handle.abort();
        }
        trace!("Arming {} in {:?}", tag.name(), delay);
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The loop may have shut down; a closed channel is fine here.
            let _ = events.send(Event::Alarm(tag));
        });
        self.pending.insert(tag.name(), handle);
    }

    fn cancel(&mut self, tag: AlarmTag) {
        if let Some(handle) = self.pending.remove(tag.name()) {
            trace!("Cancelling {}", tag.name());
            handle.abort();
        }
    }

    fn is_pending(&self, tag: AlarmTag) -> bool {
        self.pending.contains_key(tag.name())
    }
}

impl Drop for TokioAlarmService {
    fn drop(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}
