//! HTML status page.

use crate::monitor::MonitorSnapshot;
use std::fmt::Write;

/// Seconds between automatic page reloads.
pub const REFRESH_SECS: u32 = 10;

const STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 20px; background: #f5f5f5; }
.container { max-width: 800px; margin: 0 auto; background: white; padding: 20px; border-radius: 8px; }
h1 { color: #333; text-align: center; }
.status { padding: 10px; margin: 10px 0; border-radius: 4px; }
.status.connected { background: #d4edda; color: #155724; }
.status.disconnected { background: #f8d7da; color: #721c24; }
.message { background: #f8f9fa; border: 1px solid #dee2e6; border-radius: 4px; padding: 10px; margin: 5px 0; }
.timestamp { color: #6c757d; font-size: 0.9em; }
.text { margin: 5px 0; font-weight: bold; }
.empty { text-align: center; color: #6c757d; font-style: italic; padding: 20px; }";

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the status page for `snapshot`.
pub fn render(snapshot: &MonitorSnapshot) -> String {
    let status_class = if snapshot.connected {
        "connected"
    } else {
        "disconnected"
    };

    let mut html = String::new();
    // Writing to a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<title>TTS Mirror Monitor</title>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <meta http-equiv=\"refresh\" content=\"{refresh}\">\n\
         <style>\n{style}\n</style>\n</head>\n<body>\n<div class=\"container\">\n\
         <h1>TTS Mirror Monitor</h1>\n\
         <div class=\"status {class}\">State: {state} | Topic: {inbound} | Mirror: {mirror} | Playing: {playing}</div>\n\
         <h2>Latest messages ({count})</h2>\n",
        refresh = REFRESH_SECS,
        style = STYLE,
        class = status_class,
        state = snapshot.connection,
        inbound = escape(&snapshot.inbound_topic),
        mirror = escape(&snapshot.mirror_topic),
        playing = if snapshot.playing { "yes" } else { "no" },
        count = snapshot.message_count,
    );

    if snapshot.messages.is_empty() {
        html.push_str("<div class=\"empty\">No messages received</div>\n");
    }
    for message in &snapshot.messages {
        let _ = write!(
            html,
            "<div class=\"message\"><div class=\"timestamp\">{}</div><div class=\"text\">{}</div></div>\n",
            message.received_at().format("%Y-%m-%d %H:%M:%S"),
            escape(message.text()),
        );
    }

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::utterance::Utterance;
    use chrono::{Local, TimeZone};

    fn snapshot(messages: Vec<Utterance>, connected: bool) -> MonitorSnapshot {
        MonitorSnapshot {
            connection: if connected {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            },
            connected,
            playing: false,
            inbound_topic: "moxie/internal/tts".to_string(),
            mirror_topic: "moxie/tts/text".to_string(),
            message_count: messages.len(),
            messages,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<b>\"Tom & Jerry's\"</b>"),
            "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;"
        );
        assert_eq!(escape("¿Qué tal?"), "¿Qué tal?");
    }

    #[test]
    fn test_render_empty_history() {
        let html = render(&snapshot(Vec::new(), false));
        assert!(html.contains("status disconnected"));
        assert!(html.contains("State: disconnected"));
        assert!(html.contains("No messages received"));
        assert!(html.contains("content=\"10\""));
    }

    #[test]
    fn test_render_messages_escaped_with_timestamps() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();
        let messages = vec![Utterance::with_timestamp("<script>hola</script>", "t", at)];
        let html = render(&snapshot(messages, true));

        assert!(html.contains("status connected"));
        assert!(html.contains("2024-05-01 12:30:05"));
        assert!(html.contains("&lt;script&gt;hola&lt;/script&gt;"));
        assert!(!html.contains("<script>hola"));
        assert!(html.contains("Latest messages (1)"));
    }
}
