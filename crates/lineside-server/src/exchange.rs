//! Outgoing message queue.
//!
//! Every STATE_CHANGE the module produces waits here until the interlocking
//! acknowledges it. Transmission does not remove an entry; only an ACK
//! carrying the entry's hash does. Delivery is therefore at-least-once.
//!
//! Unacknowledged entries are retransmitted after `ack_timeout` and dropped
//! after `max_transmissions` sends. Reconnecting makes every entry due again.

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use lineside_core::Environment;
use lineside_proto::{Frame, MessageType};
use tokio::{
    sync::{Notify, watch},
    time::Instant,
};

use crate::{
    config::ExchangeSettings, connection::ConnectionState, error::LinkError, link::LineSink,
};

#[derive(Debug)]
struct Entry {
    seq: u64,
    frame: Frame,
    transmissions: u32,
    last_sent: Option<Instant>,
}

#[derive(Debug, Default)]
struct Entries {
    queue: VecDeque<Entry>,
    next_seq: u64,
}

/// FIFO of frames awaiting acknowledgement.
pub struct OutgoingQueue<E: Environment> {
    env: E,
    sender: String,
    settings: ExchangeSettings,
    entries: Mutex<Entries>,
    wake: Notify,
}

impl<E: Environment> OutgoingQueue<E> {
    /// Create an empty queue of frames sent as `sender`.
    pub fn new(env: E, sender: impl Into<String>, settings: ExchangeSettings) -> Self {
        Self {
            env,
            sender: sender.into(),
            settings,
            entries: Mutex::new(Entries::default()),
            wake: Notify::new(),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Append a frame. Returns its hash.
    pub fn push(&self, message_type: MessageType, body: impl Into<String>) -> i32 {
        let frame = Frame::new(self.sender.as_str(), message_type, body);
        let hash = frame.hash();
        {
            let mut entries = self.entries();
            let seq = entries.next_seq;
            entries.next_seq += 1;
            entries.queue.push_back(Entry { seq, frame, transmissions: 0, last_sent: None });
        }
        self.wake.notify_one();
        hash
    }

    /// Retire the oldest outstanding entry with `hash`. Returns whether one
    /// matched.
    pub fn acknowledge(&self, hash: i32) -> bool {
        let mut entries = self.entries();
        match entries.queue.iter().position(|entry| entry.frame.hash() == hash) {
            Some(index) => {
                entries.queue.remove(index);
                true
            },
            None => false,
        }
    }

    /// Outstanding entries.
    pub fn len(&self) -> usize {
        self.entries().queue.len()
    }

    /// Whether nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bodies of the outstanding entries, oldest first.
    pub fn pending(&self) -> Vec<String> {
        self.entries().queue.iter().map(|entry| entry.frame.body().to_string()).collect()
    }

    /// Make every entry due for immediate transmission.
    pub fn mark_all_due(&self) {
        for entry in &mut self.entries().queue {
            entry.last_sent = None;
        }
        self.wake.notify_one();
    }

    /// Entries due at `now`, as `(seq, line)`. Entries that have used up their
    /// transmissions are discarded.
    fn take_due(&self, now: Instant) -> Vec<(u64, String)> {
        let timeout = self.settings.ack_timeout();
        let max = self.settings.max_transmissions;
        let mut entries = self.entries();

        entries.queue.retain(|entry| {
            let expired = entry.transmissions >= max
                && entry.last_sent.is_some_and(|sent| now >= sent + timeout);
            if expired {
                tracing::warn!(
                    body = entry.frame.body(),
                    transmissions = entry.transmissions,
                    "no acknowledgement, message discarded"
                );
            }
            !expired
        });

        entries
            .queue
            .iter()
            .filter(|entry| entry.transmissions < max)
            .filter(|entry| entry.last_sent.is_none_or(|sent| now >= sent + timeout))
            .map(|entry| (entry.seq, entry.frame.encode()))
            .collect()
    }

    fn mark_sent(&self, seq: u64, now: Instant) {
        if let Some(entry) = self.entries().queue.iter_mut().find(|entry| entry.seq == seq) {
            entry.transmissions += 1;
            entry.last_sent = Some(now);
        }
    }

    /// Time until the next entry falls due, or `None` if nothing is waiting
    /// on a timer.
    fn next_deadline(&self, now: Instant) -> Option<Duration> {
        let timeout = self.settings.ack_timeout();
        self.entries()
            .queue
            .iter()
            .filter_map(|entry| entry.last_sent)
            .map(|sent| (sent + timeout).saturating_duration_since(now))
            .min()
    }

    /// Transmit one round of due entries through `sink`. Returns how many were
    /// sent, or the first failure.
    pub async fn transmit_due(&self, sink: &dyn LineSink) -> Result<usize, LinkError> {
        let now = self.env.now();
        let mut sent = 0;
        for (seq, line) in self.take_due(now) {
            sink.send_line(&line).await?;
            self.mark_sent(seq, now);
            sent += 1;
        }
        Ok(sent)
    }

    /// Drain loop: transmit whenever the link is connected and something is
    /// due. Returns when the link state can no longer be observed.
    pub async fn run(&self, sink: &dyn LineSink, mut state: watch::Receiver<ConnectionState>) {
        loop {
            let connected = *state.borrow_and_update() == ConnectionState::Connected;
            let healthy = connected
                && match self.transmit_due(sink).await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::debug!(error = %e, "transmission deferred");
                        false
                    },
                };

            // Retransmission timers only matter while frames can be sent.
            let deadline = if healthy { self.next_deadline(self.env.now()) } else { None };
            tokio::select! {
                () = self.wake.notified() => {},
                () = sleep_for(&self.env, deadline) => {},
                changed = state.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *state.borrow() == ConnectionState::Connected {
                        self.mark_all_due();
                    }
                },
            }
        }
    }
}

async fn sleep_for<E: Environment>(env: &E, duration: Option<Duration>) {
    match duration {
        Some(duration) => env.sleep(duration).await,
        None => std::future::pending().await,
    }
}
