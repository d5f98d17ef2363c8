// ABOUTME: Discord gateway wire format: frames, opcodes, outbound payloads and close codes
// ABOUTME: Pure data helpers with no I/O

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::GatewayError;

pub const API_BASE: &str = "https://discord.com/api/v10";
pub const GATEWAY_QUERY: &str = "v=10&encoding=json";

/// Privileged; without it guild MESSAGE_CREATE payloads arrive with empty content.
pub const MESSAGE_CONTENT_INTENT: u64 = 1 << 15;

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
pub const DEFAULT_INTENTS: u64 = 1 | (1 << 9) | MESSAGE_CONTENT_INTENT;

/// Whether `intents` lets the bot read the text of guild messages.
pub fn reads_message_content(intents: u64) -> bool {
    intents & MESSAGE_CONTENT_INTENT != 0
}

pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// One gateway frame: `{op, d, s, t}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    fn outbound(op: u8, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_text(&self) -> Result<String, GatewayError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self::outbound(opcode::HEARTBEAT, json!(sequence))
    }

    pub fn identify(token: &str, intents: u64) -> Self {
        Self::outbound(
            opcode::IDENTIFY,
            json!({
                "token": token,
                "intents": intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "igor",
                    "device": "igor",
                },
            }),
        )
    }

    pub fn resume(token: &str, session_id: &str, sequence: Option<u64>) -> Self {
        Self::outbound(
            opcode::RESUME,
            json!({
                "token": token,
                "session_id": session_id,
                "seq": sequence,
            }),
        )
    }

    /// `heartbeat_interval` from a HELLO (or heartbeat request) payload.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.d
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Dispatch event name, for op 0 frames.
    pub fn event_name(&self) -> Option<&str> {
        self.t.as_deref()
    }
}

/// Append the gateway version/encoding query to a URL from `/gateway/bot` or READY.
pub fn with_gateway_query(url: &str) -> String {
    let base = url.trim_end_matches('/');
    if base.contains('?') {
        base.to_string()
    } else {
        format!("{}/?{}", base, GATEWAY_QUERY)
    }
}

/// Close codes after which reconnecting cannot succeed.
pub fn fatal_close_reason(code: u16) -> Option<&'static str> {
    match code {
        4004 => Some("authentication failed"),
        4010 => Some("invalid shard"),
        4011 => Some("sharding required"),
        4012 => Some("invalid API version"),
        4013 => Some("invalid intents"),
        4014 => Some("disallowed intents"),
        _ => None,
    }
}

/// Close codes after which the session cannot be resumed (invalid seq, session timed out).
pub fn close_invalidates_session(code: u16) -> bool {
    matches!(code, 4007 | 4009)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hello() {
        let frame =
            GatewayFrame::parse(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#)
                .unwrap();
        assert_eq!(frame.op, opcode::HELLO);
        assert_eq!(frame.heartbeat_interval(), Some(Duration::from_millis(41250)));
        assert!(frame.s.is_none());
    }

    #[test]
    fn test_parse_dispatch_without_optional_fields() {
        let frame = GatewayFrame::parse(r#"{"op":11}"#).unwrap();
        assert_eq!(frame.op, opcode::HEARTBEAT_ACK);
        assert!(frame.d.is_null());
        assert!(frame.event_name().is_none());
    }

    #[test]
    fn test_parse_garbage_is_protocol_error() {
        let err = GatewayFrame::parse("not json").unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)));
    }

    #[test]
    fn test_heartbeat_payload_carries_sequence() {
        let text = GatewayFrame::heartbeat(Some(42)).to_text().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["op"], 1);
        assert_eq!(value["d"], 42);

        let text = GatewayFrame::heartbeat(None).to_text().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value["d"].is_null());
    }

    #[test]
    fn test_default_intents_read_message_content() {
        assert_eq!(DEFAULT_INTENTS, 33281);
        assert!(reads_message_content(DEFAULT_INTENTS));
        assert!(!reads_message_content(513));
    }

    #[test]
    fn test_identify_payload() {
        let frame = GatewayFrame::identify("tok", DEFAULT_INTENTS);
        assert_eq!(frame.op, opcode::IDENTIFY);
        assert_eq!(frame.d["token"], "tok");
        assert_eq!(frame.d["intents"], 33281);
        assert_eq!(frame.d["properties"]["browser"], "igor");
        assert_eq!(frame.d["properties"]["os"], std::env::consts::OS);
    }

    #[test]
    fn test_resume_payload() {
        let frame = GatewayFrame::resume("tok", "sess", Some(7));
        assert_eq!(frame.op, opcode::RESUME);
        assert_eq!(frame.d["session_id"], "sess");
        assert_eq!(frame.d["seq"], 7);
    }

    #[test]
    fn test_with_gateway_query() {
        assert_eq!(
            with_gateway_query("wss://gateway.discord.gg"),
            "wss://gateway.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(
            with_gateway_query("wss://resume.discord.gg/"),
            "wss://resume.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(with_gateway_query("wss://x/?v=9"), "wss://x/?v=9");
    }

    #[test]
    fn test_fatal_close_codes() {
        assert!(fatal_close_reason(4004).is_some());
        for code in 4010..=4014 {
            assert!(fatal_close_reason(code).is_some(), "{} should be fatal", code);
        }
        assert!(fatal_close_reason(1000).is_none());
        assert!(fatal_close_reason(4000).is_none());
        assert!(fatal_close_reason(4009).is_none());
        assert!(close_invalidates_session(4009));
        assert!(!close_invalidates_session(4000));
    }
}
