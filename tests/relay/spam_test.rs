//! Tests for `relay::spam` advertisement detection.

use relaygate::relay::spam::{is_advertisement, AdFilter};
use relaygate::types::{ControlButton, InboundMessage, Payload, Sender};

fn sender() -> Sender {
    Sender {
        username: None,
        first_name: "Carol".to_owned(),
    }
}

fn defaults() -> AdFilter {
    AdFilter::with_defaults().expect("default filter compiles")
}

#[test]
fn plain_text_passes() {
    let message = InboundMessage::text(sender(), "Hi, I have a question about my order");
    assert!(!defaults().is_advertisement(&message));
}

#[test]
fn keyword_match_is_case_insensitive() {
    let message = InboundMessage::text(sender(), "Best CASINO bonuses here");
    assert!(defaults().is_advertisement(&message));
}

#[test]
fn keyword_in_caption_is_detected() {
    let message = InboundMessage {
        sender: sender(),
        payload: Some(Payload::Photo {
            file_id: "p".to_owned(),
            caption: Some("claim your free crypto".to_owned()),
        }),
        ..InboundMessage::default()
    };
    assert!(defaults().is_advertisement(&message));
}

#[test]
fn linked_channel_origin_is_advertisement() {
    let message = InboundMessage {
        from_linked_channel: true,
        ..InboundMessage::text(sender(), "harmless")
    };
    assert!(defaults().is_advertisement(&message));
}

#[test]
fn inline_bot_relay_is_advertisement() {
    let message = InboundMessage {
        via_bot: true,
        ..InboundMessage::text(sender(), "harmless")
    };
    assert!(defaults().is_advertisement(&message));
}

#[test]
fn only_link_buttons_count() {
    let callback_only = InboundMessage {
        buttons: vec![ControlButton {
            label: "Vote".to_owned(),
            url: None,
        }],
        ..InboundMessage::text(sender(), "harmless")
    };
    assert!(!defaults().is_advertisement(&callback_only));

    let with_link = InboundMessage {
        buttons: vec![ControlButton {
            label: "Open".to_owned(),
            url: Some("https://example.org".to_owned()),
        }],
        ..InboundMessage::text(sender(), "harmless")
    };
    assert!(defaults().is_advertisement(&with_link));
}

#[test]
fn custom_keywords_replace_defaults() {
    let filter = AdFilter::new(&["buy now"]).expect("compiles");
    assert!(filter.is_advertisement(&InboundMessage::text(sender(), "BUY NOW!!!")));
    assert!(!filter.is_advertisement(&InboundMessage::text(sender(), "casino night")));
}

#[test]
fn empty_keyword_list_still_checks_structure() {
    let filter = AdFilter::new::<&str>(&[]).expect("compiles");
    assert!(!filter.is_advertisement(&InboundMessage::text(sender(), "casino")));

    let via_bot = InboundMessage {
        via_bot: true,
        ..InboundMessage::text(sender(), "casino")
    };
    assert!(filter.is_advertisement(&via_bot));
}

#[test]
fn free_function_without_keywords() {
    let sticker = InboundMessage {
        sender: sender(),
        payload: Some(Payload::Sticker {
            file_id: "s".to_owned(),
        }),
        ..InboundMessage::default()
    };
    assert!(!is_advertisement(&sticker, None));
}
