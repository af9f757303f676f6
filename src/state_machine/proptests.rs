//! Property-based tests for the reducer
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::*;
use crate::model::Conversation;
use crate::stream::StreamEvent;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ReduceContext {
    ReduceContext::at(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
}

fn test_state() -> ConversationState {
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    ConversationState::new(Conversation::new("chat-1", "New Chat", created))
}

fn run(events: Vec<StreamEvent>) -> ConversationState {
    let ctx = test_context();
    events
        .into_iter()
        .fold(test_state(), |state, event| apply(state, &ctx, event).state)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Small id space so events collide with started messages often
fn arb_id() -> impl Strategy<Value = String> {
    prop_oneof![Just("m1"), Just("m2"), Just("m3"), Just("")].prop_map(String::from)
}

fn arb_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        1 => Just(StreamEvent::UserEchoed),
        3 => arb_id().prop_map(|message_id| StreamEvent::AssistantStart { message_id }),
        6 => (arb_id(), "[a-z ]{0,6}")
            .prop_map(|(message_id, text)| StreamEvent::ContentDelta { message_id, text }),
        2 => arb_id().prop_map(|message_id| StreamEvent::AssistantComplete { message_id }),
        1 => "[A-Za-z ]{1,12}".prop_map(|title| StreamEvent::TitleAssigned { title }),
        1 => "[a-z ]{0,12}".prop_map(|detail| StreamEvent::StreamError { detail }),
        1 => Just(StreamEvent::StreamEnd),
    ]
}

// ============================================================================
// Invariants
// ============================================================================

proptest! {
    #[test]
    fn at_most_one_streaming_message(events in proptest::collection::vec(arb_event(), 0..40)) {
        let ctx = test_context();
        let mut state = test_state();
        for event in events {
            state = apply(state, &ctx, event).state;
            let streaming = state.conversation.messages.iter().filter(|m| m.streaming).count();
            prop_assert!(streaming <= 1);
        }
    }

    #[test]
    fn deltas_concatenate_in_order(chunks in proptest::collection::vec("[a-zA-Z0-9 .,]{0,10}", 0..20)) {
        let mut events = vec![StreamEvent::AssistantStart { message_id: "m1".into() }];
        events.extend(chunks.iter().map(|text| StreamEvent::ContentDelta {
            message_id: "m1".into(),
            text: text.clone(),
        }));
        let state = run(events);
        prop_assert_eq!(&state.conversation.message("m1").unwrap().content, &chunks.concat());
    }

    #[test]
    fn repeated_complete_is_idempotent(
        prefix in proptest::collection::vec(arb_event(), 0..20),
        repeats in 1usize..4,
    ) {
        let ctx = test_context();
        let once = apply(run(prefix.clone()), &ctx, StreamEvent::AssistantComplete { message_id: "m1".into() }).state;
        let mut many = run(prefix);
        for _ in 0..repeats {
            many = apply(many, &ctx, StreamEvent::AssistantComplete { message_id: "m1".into() }).state;
        }
        prop_assert_eq!(once, many);
    }

    #[test]
    fn unknown_id_delta_never_mutates(
        prefix in proptest::collection::vec(arb_event(), 0..20),
        text in "[a-z]{1,8}",
    ) {
        let ctx = test_context();
        let before = run(prefix);
        let t = apply(before.clone(), &ctx, StreamEvent::ContentDelta {
            message_id: "never-started".into(),
            text,
        });
        prop_assert_eq!(&t.state, &before);
        prop_assert!(matches!(t.effects.as_slice(), [Effect::Ignored(_)]));
    }

    #[test]
    fn finalized_content_never_changes(events in proptest::collection::vec(arb_event(), 0..40)) {
        let ctx = test_context();
        let mut state = test_state();
        for event in events {
            let finalized: Vec<(String, String)> = state
                .conversation
                .messages
                .iter()
                .filter(|m| !m.streaming)
                .map(|m| (m.id.clone(), m.content.clone()))
                .collect();
            state = apply(state, &ctx, event).state;
            for (id, content) in finalized {
                prop_assert_eq!(&state.conversation.message(&id).unwrap().content, &content);
            }
        }
    }

    #[test]
    fn nothing_streams_after_termination(events in proptest::collection::vec(arb_event(), 0..40)) {
        let state = run(events);
        if state.stream.is_terminated() {
            prop_assert!(!state.has_streaming_message());
        }
    }
}
