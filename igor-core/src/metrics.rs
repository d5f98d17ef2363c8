// ABOUTME: Counter helpers for dispatch and connection observability
// ABOUTME: Thin wrappers over the metrics facade; no-ops until a recorder is installed

use metrics::counter;

/// An event was handed to a reactor.
pub fn record_event_dispatched(reactor: &str) {
    counter!("igor_events_dispatched_total", "reactor" => reactor.to_string()).increment(1);
}

/// No reactor claimed an event.
pub fn record_unhandled_event(channel: &str) {
    counter!("igor_events_unhandled_total", "channel" => channel.to_string()).increment(1);
}

/// A reactor returned an error or panicked.
pub fn record_reactor_failure(reactor: &str) {
    counter!("igor_reactor_failures_total", "reactor" => reactor.to_string()).increment(1);
}

/// A response could not be delivered (unknown channel or send error).
pub fn record_routing_failure(channel: &str) {
    counter!("igor_routing_failures_total", "channel" => channel.to_string()).increment(1);
}

/// A channel's listener exited with an error.
pub fn record_channel_failure(channel: &str) {
    counter!("igor_channel_failures_total", "channel" => channel.to_string()).increment(1);
}

/// A gateway connection ended and a new attempt starts. `kind` is "resume" or "fresh".
pub fn record_gateway_reconnect(kind: &'static str) {
    counter!("igor_gateway_reconnects_total", "kind" => kind).increment(1);
}
