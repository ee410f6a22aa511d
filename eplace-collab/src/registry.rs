//! Live subscriptions keyed by correlation id.
//!
//! Every inbound frame is routed by its id to exactly one handler.
//! Frames for unknown ids (late deliveries after an unsubscribe, or ids
//! from a previous session) are dropped with a warning. Entries outlive
//! disconnects; [`SubscriptionRegistry::resubscribe_all`] replays them
//! with their original ids once a new link is up.
//!
//! Ids whose start frame went out but which have not heard back from the
//! authority yet are tracked as pending acknowledgements.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::protocol::{
    InboundBody, InboundFrame, OutboundFrame, ProtocolError, RemoteError, SubscriptionId, Topic,
};
use crate::transport::FrameSink;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    Topic(#[from] ProtocolError),
}

/// What a subscription handler receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Data(Value),
    Failed(RemoteError),
}

pub type Handler = Box<dyn FnMut(Delivery) + Send>;

struct Subscription {
    topic: Topic,
    room: String,
    on_event: Handler,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("room", &self.room)
            .finish_non_exhaustive()
    }
}

/// How one inbound frame was routed.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Delivered,
    /// Acknowledgement or stop notice; nothing reaches the handler.
    Acknowledged,
    /// Error frame handed to the handler. The subscription is kept.
    Failed(RemoteError),
    /// No subscription with this id.
    Dropped,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<SubscriptionId, Subscription>,
    pending: HashSet<SubscriptionId>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn topic_of(&self, id: &SubscriptionId) -> Option<Topic> {
        self.entries.get(id).map(|s| s.topic)
    }

    /// Ids whose start frame was sent and not yet acknowledged.
    pub fn pending_acks(&self) -> &HashSet<SubscriptionId> {
        &self.pending
    }

    /// Register a handler and send the start frame.
    ///
    /// An unknown topic registers nothing and sends nothing. If the sink
    /// drops the frame (not connected) the entry is kept and replayed on
    /// the next connect.
    pub fn subscribe<S, F>(
        &mut self,
        sink: &mut S,
        topic: &str,
        room: &str,
        on_event: F,
    ) -> Result<SubscriptionId, RegistryError>
    where
        S: FrameSink + ?Sized,
        F: FnMut(Delivery) + Send + 'static,
    {
        let topic: Topic = topic.parse()?;
        let id = SubscriptionId::generate();
        self.entries.insert(
            id.clone(),
            Subscription {
                topic,
                room: room.to_string(),
                on_event: Box::new(on_event),
            },
        );
        log::debug!("Subscribing {id} to {topic} for room '{room}'");
        if sink.send_frame(&OutboundFrame::subscribe(id.clone(), topic, room)) {
            self.pending.insert(id.clone());
        } else {
            log::info!("Subscription {id} queued until the next connect");
        }
        Ok(id)
    }

    /// Remove the entry, then send the stop frame.
    ///
    /// Returns `false` (and sends nothing) for an unknown id.
    pub fn unsubscribe<S>(&mut self, sink: &mut S, id: &SubscriptionId) -> bool
    where
        S: FrameSink + ?Sized,
    {
        self.pending.remove(id);
        if self.entries.remove(id).is_none() {
            log::warn!("Unsubscribe for unknown subscription {id}");
            return false;
        }
        sink.send_frame(&OutboundFrame::stop(id.clone()));
        true
    }

    /// Route one inbound frame to its handler.
    pub fn dispatch(&mut self, frame: InboundFrame) -> DispatchOutcome {
        let Some(sub) = self.entries.get_mut(&frame.id) else {
            log::warn!("Dropping frame for unknown subscription {}", frame.id);
            return DispatchOutcome::Dropped;
        };
        // Any reply from the authority settles the start frame.
        self.pending.remove(&frame.id);
        match frame.body {
            InboundBody::Started => {
                log::debug!("Subscription {} started", frame.id);
                DispatchOutcome::Acknowledged
            }
            InboundBody::Stopped => {
                log::debug!("Subscription {} stopped by authority", frame.id);
                DispatchOutcome::Acknowledged
            }
            InboundBody::Data(payload) => {
                (sub.on_event)(Delivery::Data(payload));
                DispatchOutcome::Delivered
            }
            InboundBody::Error(error) => {
                log::warn!("Subscription {} ({}) failed: {error}", frame.id, sub.topic);
                (sub.on_event)(Delivery::Failed(error.clone()));
                DispatchOutcome::Failed(error)
            }
        }
    }

    /// Re-send a start frame for every live entry, reusing its id.
    pub fn resubscribe_all<S>(&mut self, sink: &mut S) -> usize
    where
        S: FrameSink + ?Sized,
    {
        let mut sent = 0;
        for (id, sub) in &self.entries {
            if sink.send_frame(&OutboundFrame::subscribe(id.clone(), sub.topic, &sub.room)) {
                self.pending.insert(id.clone());
                sent += 1;
            }
        }
        if sent > 0 {
            log::info!("Resubscribed {sent} stream(s)");
        }
        sent
    }

    /// Forget every entry without sending stop frames.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
    }
}
