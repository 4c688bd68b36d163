//! In-memory transport for tests.

use crate::error::{MirrorError, Result};
use crate::transport::{DisconnectReason, QoS, Transport, TransportEvents};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// One recorded publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
}

#[derive(Default)]
struct MockState {
    events: Option<Arc<dyn TransportEvents>>,
    connect_calls: usize,
    publish_calls: usize,
    published: Vec<Published>,
    subscriptions: Vec<(String, QoS)>,
    fail_publishes: HashSet<usize>,
    refuse_connect: Option<String>,
    disconnects: usize,
}

/// Transport that records traffic and can be scripted to fail.
///
/// By default `connect` succeeds immediately and reports `on_connect(Ok)`
/// synchronously. Use [`MockTransport::manual`] to fire events by hand.
pub struct MockTransport {
    auto_connect: bool,
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            auto_connect: true,
            state: Mutex::new(MockState::default()),
        }
    }

    /// A transport whose `connect` only registers the event handler.
    pub fn manual() -> Self {
        Self {
            auto_connect: false,
            ..Self::new()
        }
    }

    /// Fail the publish call with this 1-based sequence number.
    pub fn with_failed_publish(self, call: usize) -> Self {
        self.lock().fail_publishes.insert(call);
        self
    }

    /// Make every connection attempt report this error.
    pub fn with_refused_connect(self, reason: &str) -> Self {
        self.lock().refuse_connect = Some(reason.to_string());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn events(&self) -> Option<Arc<dyn TransportEvents>> {
        self.lock().events.clone()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<Published> {
        self.lock().published.clone()
    }

    /// Payloads published to `topic`, in order.
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.clone())
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.lock().subscriptions.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.lock().disconnects
    }

    /// Report a successful (re)connection to the registered handler.
    pub fn fire_connected(&self) {
        if let Some(events) = self.events() {
            events.on_connect(Ok(()));
        }
    }

    /// Report a failed connection attempt.
    pub fn fire_connect_failed(&self, reason: &str) {
        if let Some(events) = self.events() {
            events.on_connect(Err(reason.to_string()));
        }
    }

    /// Report an unexpected connection drop.
    pub fn fire_connection_lost(&self, reason: &str) {
        if let Some(events) = self.events() {
            events.on_disconnect(DisconnectReason::Lost(reason.to_string()));
        }
    }

    /// Deliver an inbound message.
    pub fn fire_message(&self, topic: &str, payload: &[u8]) {
        if let Some(events) = self.events() {
            events.on_message(topic, payload);
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn connect(&self, events: Arc<dyn TransportEvents>) -> Result<()> {
        let refused = {
            let mut state = self.lock();
            state.connect_calls += 1;
            state.events = Some(Arc::clone(&events));
            state.refuse_connect.clone()
        };

        // Callbacks run without the lock held; they call back into publish.
        match refused {
            Some(reason) => events.on_connect(Err(reason)),
            None if self.auto_connect => events.on_connect(Ok(())),
            None => {}
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        self.lock().subscriptions.push((topic.to_string(), qos));
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<()> {
        let mut state = self.lock();
        state.publish_calls += 1;
        let call = state.publish_calls;
        if state.fail_publishes.contains(&call) {
            return Err(MirrorError::PublishFailed {
                message: format!("scripted failure on publish {}", call),
            });
        }
        state.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
        });
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let events = {
            let mut state = self.lock();
            state.disconnects += 1;
            state.events.take()
        };
        if let Some(events) = events {
            events.on_disconnect(DisconnectReason::Requested);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingEvents {
        connects: Mutex<Vec<std::result::Result<(), String>>>,
        disconnects: Mutex<Vec<DisconnectReason>>,
    }

    impl TransportEvents for CountingEvents {
        fn on_connect(&self, result: std::result::Result<(), String>) {
            self.connects.lock().unwrap().push(result);
        }

        fn on_disconnect(&self, reason: DisconnectReason) {
            self.disconnects.lock().unwrap().push(reason);
        }

        fn on_message(&self, _topic: &str, _payload: &[u8]) {}
    }

    #[test]
    fn test_auto_connect_reports_success() {
        let transport = MockTransport::new();
        let events = Arc::new(CountingEvents::default());
        transport.connect(events.clone()).unwrap();
        assert_eq!(*events.connects.lock().unwrap(), vec![Ok(())]);
        assert_eq!(transport.connect_calls(), 1);
    }

    #[test]
    fn test_manual_connect_reports_nothing() {
        let transport = MockTransport::manual();
        let events = Arc::new(CountingEvents::default());
        transport.connect(events.clone()).unwrap();
        assert!(events.connects.lock().unwrap().is_empty());

        transport.fire_connected();
        assert_eq!(events.connects.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_refused_connect_reports_error() {
        let transport = MockTransport::new().with_refused_connect("broker down");
        let events = Arc::new(CountingEvents::default());
        transport.connect(events.clone()).unwrap();
        assert_eq!(
            *events.connects.lock().unwrap(),
            vec![Err("broker down".to_string())]
        );
    }

    #[test]
    fn test_scripted_publish_failure() {
        let transport = MockTransport::new().with_failed_publish(2);
        assert!(transport.publish("t", "one", QoS::AtLeastOnce).is_ok());
        assert!(transport.publish("t", "two", QoS::AtLeastOnce).is_err());
        assert!(transport.publish("t", "three", QoS::AtLeastOnce).is_ok());
        assert_eq!(transport.payloads("t"), vec!["one", "three"]);
    }

    #[test]
    fn test_disconnect_notifies_and_unregisters() {
        let transport = MockTransport::new();
        let events = Arc::new(CountingEvents::default());
        transport.connect(events.clone()).unwrap();
        transport.disconnect().unwrap();

        assert_eq!(
            *events.disconnects.lock().unwrap(),
            vec![DisconnectReason::Requested]
        );
        // No handler left to notify.
        transport.fire_connected();
        assert_eq!(events.connects.lock().unwrap().len(), 1);
    }
}
