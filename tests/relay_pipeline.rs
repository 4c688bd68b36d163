//! End-to-end relay behaviour over the in-memory transport.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tts_mirror::connection::{ConnectionManager, ConnectionSettings};
use tts_mirror::relay::{OrderedRelay, RelayOutcome, RelaySettings};
use tts_mirror::transport::MockTransport;

const MIRROR: &str = "moxie/tts/text";
const MARKER: &str = "OK ES-MQTT";

fn relay_over(transport: Arc<MockTransport>, max_chunk_size: usize) -> OrderedRelay {
    let connection = Arc::new(ConnectionManager::new(
        transport,
        ConnectionSettings::default(),
    ));
    connection.connect();
    OrderedRelay::new(
        connection,
        RelaySettings {
            max_chunk_size,
            pacing: Duration::from_millis(1),
            reconnect_attempts: 3,
            reconnect_poll: Duration::from_millis(1),
            ..RelaySettings::default()
        },
    )
}

fn mirrored(transport: &MockTransport) -> Vec<String> {
    let payloads = transport.payloads(MIRROR);
    assert_eq!(payloads.first().map(String::as_str), Some(MARKER));
    payloads[1..].to_vec()
}

#[test]
fn short_utterance_is_one_message() {
    let transport = Arc::new(MockTransport::new());
    let relay = relay_over(transport.clone(), 400);

    assert_eq!(relay.relay("Hola"), RelayOutcome::Delivered { chunks: 1 });
    assert_eq!(mirrored(&transport), vec!["Hola"]);
}

#[test]
fn unbroken_text_is_hard_split() {
    let transport = Arc::new(MockTransport::new());
    let relay = relay_over(transport.clone(), 400);

    relay.relay(&"a".repeat(500));

    assert_eq!(mirrored(&transport), vec!["a".repeat(400), "a".repeat(100)]);
}

#[test]
fn long_prose_splits_on_word_boundaries() {
    let mut text = String::new();
    while text.chars().count() < 420 {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str("uno dos tres");
    }

    let transport = Arc::new(MockTransport::new());
    let relay = relay_over(transport.clone(), 400);
    relay.relay(&text);

    let chunks = mirrored(&transport);
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| c.chars().count() <= 400));
    assert!(chunks.iter().all(|c| !c.starts_with(' ') && !c.ends_with(' ')));
    assert_eq!(chunks.join(" "), text);

    // The first chunk could not take one more word.
    let next_word = chunks[1].split(' ').next().unwrap();
    assert!(chunks[0].chars().count() + 1 + next_word.chars().count() > 400);
}

#[test]
fn failed_chunk_aborts_only_its_utterance() {
    // Chunks are "alfa beta", "gamma", "delta", "epsilon". Publish 1 is
    // the marker, so publish 3 is "gamma".
    let transport = Arc::new(MockTransport::new().with_failed_publish(3));
    let relay = relay_over(transport.clone(), 10);

    let outcome = relay.relay("alfa beta gamma delta epsilon");
    assert_eq!(
        outcome,
        RelayOutcome::Partial {
            published: 1,
            total: 4
        }
    );
    assert_eq!(mirrored(&transport), vec!["alfa beta"]);

    assert!(relay.relay("zeta").is_delivered());
    assert_eq!(mirrored(&transport), vec!["alfa beta", "zeta"]);
}

#[test]
fn concurrent_utterances_never_interleave() {
    let transport = Arc::new(MockTransport::new());
    let relay = Arc::new(relay_over(transport.clone(), 3));

    let utterances: Vec<String> = ["x", "y", "z", "w"]
        .iter()
        .map(|p| (1..=5).map(|i| format!("{}{}", p, i)).collect::<Vec<_>>().join(" "))
        .collect();

    let handles: Vec<_> = utterances
        .iter()
        .cloned()
        .map(|text| {
            let relay = Arc::clone(&relay);
            thread::spawn(move || relay.relay(&text))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().is_delivered());
    }

    let chunks = mirrored(&transport);
    assert_eq!(chunks.len(), 20);
    for run in chunks.chunks(5) {
        let prefix = run[0].chars().next().unwrap();
        let expected: Vec<String> = (1..=5).map(|i| format!("{}{}", prefix, i)).collect();
        assert_eq!(run, expected.as_slice());
    }
}

#[test]
fn relay_reconnects_after_drop() {
    let transport = Arc::new(MockTransport::new());
    let relay = relay_over(transport.clone(), 400);

    transport.fire_connection_lost("keep-alive timeout");
    assert!(relay.relay("de vuelta").is_delivered());

    assert_eq!(transport.connect_calls(), 2);
    // Still only one marker.
    assert_eq!(mirrored(&transport), vec!["de vuelta"]);
}
