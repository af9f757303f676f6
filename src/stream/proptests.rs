//! Property-based tests for the frame decoder

use super::*;
use proptest::prelude::*;

fn arb_frame() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(r#"{"type":"user_message","message":{"id":"u1"}}"#.to_string()),
        "[a-z0-9]{1,8}".prop_map(|id| format!(r#"{{"type":"ai_message_start","message_id":"{id}"}}"#)),
        "[a-zA-Z \u{e9}\u{4e2d}]{0,12}"
            .prop_map(|text| format!(r#"{{"type":"content_delta","content":"{text}"}}"#)),
        "[a-z0-9]{1,8}".prop_map(|id| format!(r#"{{"type":"ai_message_complete","message":{{"id":"{id}"}}}}"#)),
        "[A-Za-z ]{1,20}".prop_map(|name| format!(r#"{{"type":"chat_name","name":"{name}"}}"#)),
        Just("{broken".to_string()),
    ]
}

fn arb_line() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => arb_frame().prop_map(|f| format!("data: {f}\n\n")),
        1 => Just(": keepalive\n".to_string()),
        1 => Just("event: message\r\n".to_string()),
    ]
}

fn arb_body() -> impl Strategy<Value = Vec<u8>> {
    (proptest::collection::vec(arb_line(), 0..12), any::<bool>()).prop_map(|(lines, end)| {
        let mut body = lines.concat();
        if end {
            body.push_str("data: {\"type\":\"stream_complete\"}\n\n");
        }
        body.into_bytes()
    })
}

fn decode_in_chunks(body: &[u8], cuts: &[usize]) -> Vec<StreamEvent> {
    let mut decoder = FrameDecoder::new();
    let mut events = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        events.extend(decoder.push(&body[start..cut]));
        start = cut;
    }
    events.extend(decoder.push(&body[start..]));
    events.extend(decoder.finish());
    events
}

proptest! {
    #[test]
    fn prop_single_split_matches_whole(body in arb_body(), offset in any::<prop::sample::Index>()) {
        let whole = decode_in_chunks(&body, &[]);
        let cut = offset.index(body.len() + 1);
        let split = decode_in_chunks(&body, &[cut]);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn prop_many_splits_match_whole(
        body in arb_body(),
        raw_cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let whole = decode_in_chunks(&body, &[]);
        let mut cuts: Vec<usize> = raw_cuts.iter().map(|i| i.index(body.len() + 1)).collect();
        cuts.sort_unstable();
        prop_assert_eq!(whole, decode_in_chunks(&body, &cuts));
    }

    #[test]
    fn prop_byte_at_a_time_matches_whole(body in arb_body()) {
        let whole = decode_in_chunks(&body, &[]);
        let cuts: Vec<usize> = (1..body.len()).collect();
        prop_assert_eq!(whole, decode_in_chunks(&body, &cuts));
    }

    #[test]
    fn prop_at_most_one_terminal_event(body in arb_body()) {
        let events = decode_in_chunks(&body, &[]);
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        prop_assert!(terminals <= 1);
        if terminals == 1 {
            prop_assert!(events.last().is_some_and(StreamEvent::is_terminal));
        }
    }
}
