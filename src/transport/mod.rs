//! Publish/subscribe transport abstraction.
//!
//! The relay only needs connect/subscribe/publish/disconnect plus a handful
//! of lifecycle callbacks. [`MqttTransport`] provides them over `rumqttc`;
//! [`MockTransport`] records traffic for tests.

pub mod backoff;
pub mod mock;
pub mod mqtt;

pub use backoff::Backoff;
pub use mock::MockTransport;
pub use mqtt::{MqttSettings, MqttTransport};

use crate::error::Result;
use std::sync::Arc;

/// Delivery guarantee requested for a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Why a transport connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called locally.
    Requested,
    /// The connection dropped; the transport keeps retrying.
    Lost(String),
}

/// Lifecycle callbacks a transport delivers from its network loop.
///
/// Implementations must return quickly: they run on the transport's own
/// thread and may only issue non-blocking transport calls.
pub trait TransportEvents: Send + Sync {
    /// A connection attempt finished. `Err` carries the broker's or the
    /// network's reason.
    fn on_connect(&self, result: std::result::Result<(), String>);

    /// An established connection ended.
    fn on_disconnect(&self, reason: DisconnectReason);

    /// A message arrived on a subscribed topic.
    fn on_message(&self, topic: &str, payload: &[u8]);
}

/// Connection to a publish/subscribe broker.
///
/// Object-safe, Send + Sync for use from the relay, the CLI and the
/// transport's own callbacks.
pub trait Transport: Send + Sync {
    /// Start connecting and deliver lifecycle events to `events`.
    ///
    /// Calling this while a network loop is already running is a no-op.
    fn connect(&self, events: Arc<dyn TransportEvents>) -> Result<()>;

    /// Subscribe to `topic`.
    fn subscribe(&self, topic: &str, qos: QoS) -> Result<()>;

    /// Queue `payload` for `topic`. `Ok` means the transport accepted it.
    fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<()>;

    /// Stop the network loop and drop the connection.
    fn disconnect(&self) -> Result<()>;

    /// Short name for logging.
    fn name(&self) -> &'static str {
        "transport"
    }
}
