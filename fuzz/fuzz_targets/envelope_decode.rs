//! Fuzz target for inbound envelope decoding
//!
//! # Strategy
//!
//! - Raw text: arbitrary strings straight off the wire
//! - Known kinds: a valid `type` tag with arbitrary (often mistyped) fields
//! - Deep nesting: payload objects nested to arbitrary depth
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - Every accepted envelope re-encodes, and the re-encoding decodes to the
//!   same event
//! - Rejections carry the raw payload they rejected

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tidings_proto::{InboundEvent, OutboundCommand};

const KINDS: [&str; 6] =
    ["conversations", "message", "message_status", "history", "init", "typing"];

#[derive(Debug, Arbitrary)]
enum Envelope {
    Raw(String),
    Known { kind: u8, field: String, value: String },
    Nested { kind: u8, depth: u8 },
}

fn check(text: &str) {
    match InboundEvent::decode(text) {
        Ok(event) => {
            let encoded = event.encode().expect("accepted envelopes re-encode");
            let again = InboundEvent::decode(&encoded).expect("re-encoded envelopes decode");
            assert_eq!(again, event);
        },
        Err(e) => assert_eq!(e.raw(), text),
    }

    // Outbound decoding is used by tooling and must be just as robust
    let _ = OutboundCommand::decode(text);
}

fuzz_target!(|envelope: Envelope| {
    match envelope {
        Envelope::Raw(text) => check(&text),
        Envelope::Known { kind, field, value } => {
            let kind = KINDS[usize::from(kind) % KINDS.len()];
            let field = serde_json_escape(&field);
            // Value is spliced in raw so it is often not valid JSON
            check(&format!(r#"{{"type":"{kind}","{field}":{value}}}"#));
            check(&format!(r#"{{"type":"{kind}","{field}":"{}"}}"#, serde_json_escape(&value)));
        },
        Envelope::Nested { kind, depth } => {
            let kind = KINDS[usize::from(kind) % KINDS.len()];
            let depth = usize::from(depth);
            let text = format!(
                r#"{{"type":"{kind}","message":{}1{}}}"#,
                "[".repeat(depth),
                "]".repeat(depth)
            );
            check(&text);
        },
    }
});

fn serde_json_escape(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['\\', '"'],
            '\\' => vec!['\\', '\\'],
            c if c.is_control() => vec![' '],
            c => vec![c],
        })
        .collect()
}
