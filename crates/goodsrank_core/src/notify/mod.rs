//! Change notification toward the outbound message bus.
//!
//! # Responsibility
//! - Describe committed goods mutations as raw JSON payloads.
//! - Hand payloads to a notifier without letting publish failures reach
//!   the mutation that produced them.
//!
//! # Invariants
//! - Publishing happens only after the mutation committed.
//! - `publish` never blocks on a slow or absent consumer.

use crate::config::NotifyConfig;
use crate::model::good::{Good, GoodId, GroupId};
use crate::time::now_epoch_ms;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

/// Channel the core publishes change events on.
pub const DEFAULT_CHANNEL: &str = "event";

/// Downstream topic the forwarder republishes to.
pub const DEFAULT_TOPIC: &str = "log-events";

/// Kind of committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    GoodCreated,
    GoodUpdated,
    GoodRemoved,
    GoodsReprioritized,
}

/// One committed mutation, as published on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event: ChangeKind,
    pub id: GoodId,
    pub group_id: GroupId,
    pub priority: i64,
    pub removed: bool,
    /// Epoch milliseconds at publish time.
    pub at: i64,
}

impl ChangeEvent {
    pub fn for_good(event: ChangeKind, good: &Good) -> Self {
        Self {
            event,
            id: good.id,
            group_id: good.group_id,
            priority: good.priority,
            removed: good.removed,
            at: now_epoch_ms(),
        }
    }

    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Fire-and-forget publisher.
pub trait ChangeNotifier {
    fn publish(&self, channel: &str, payload: &str);
}

/// Drops every payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn publish(&self, _channel: &str, _payload: &str) {}
}

/// Writes every payload to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ChangeNotifier for LogNotifier {
    fn publish(&self, channel: &str, payload: &str) {
        info!("event=change_publish module=notify status=ok channel={channel} payload={payload}");
    }
}

/// Payload received through a [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub channel: String,
    pub payload: String,
}

/// Hands payloads to an in-process receiver.
pub struct ChannelNotifier {
    sender: Mutex<Sender<Published>>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end consumers read from.
    pub fn new() -> (Self, Receiver<Published>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl ChangeNotifier for ChannelNotifier {
    fn publish(&self, channel: &str, payload: &str) {
        let Ok(sender) = self.sender.lock() else {
            warn!("event=change_publish module=notify status=error channel={channel} error_code=lock_poisoned");
            return;
        };
        let message = Published {
            channel: channel.to_string(),
            payload: payload.to_string(),
        };
        if sender.send(message).is_err() {
            warn!("event=change_publish module=notify status=error channel={channel} error_code=receiver_closed");
        }
    }
}

/// Relays payloads from one channel verbatim to a downstream topic.
pub struct Forwarder<N: ChangeNotifier> {
    channel: String,
    topic: String,
    downstream: N,
}

impl<N: ChangeNotifier> Forwarder<N> {
    pub fn new(channel: impl Into<String>, topic: impl Into<String>, downstream: N) -> Self {
        Self {
            channel: channel.into(),
            topic: topic.into(),
            downstream,
        }
    }

    /// Watches `notify.channel` and republishes under `notify.topic`.
    pub fn from_config(notify: &NotifyConfig, downstream: N) -> Self {
        Self::new(notify.channel.as_str(), notify.topic.as_str(), downstream)
    }

    /// Forwards one message; returns whether it matched the watched channel.
    pub fn forward(&self, message: &Published) -> bool {
        if message.channel != self.channel {
            return false;
        }
        self.downstream.publish(&self.topic, &message.payload);
        true
    }

    /// Forwards everything already queued on `receiver`; returns the count.
    pub fn drain(&self, receiver: &Receiver<Published>) -> usize {
        receiver
            .try_iter()
            .filter(|message| self.forward(message))
            .count()
    }
}
