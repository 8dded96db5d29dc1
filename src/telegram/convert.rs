//! Conversion of teloxide messages into transport-agnostic snapshots.

use teloxide::types::{InlineKeyboardButtonKind, Message};

use crate::types::{ControlButton, InboundMessage, OutboundId, Payload, Sender};

/// Snapshot `msg` as an [`InboundMessage`].
///
/// Unsupported kinds (polls, dice, games, ...) yield `payload: None`.
pub fn inbound_message(msg: &Message) -> InboundMessage {
    let sender = msg
        .from
        .as_ref()
        .map(|user| Sender {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
        })
        .unwrap_or_default();

    InboundMessage {
        sender,
        payload: payload_of(msg),
        from_linked_channel: msg.sender_chat.is_some(),
        via_bot: msg.via_bot.is_some(),
        buttons: buttons_of(msg),
    }
}

/// Operator-facing id of the message `msg` replies to, if any.
pub fn replied_to(msg: &Message) -> Option<OutboundId> {
    msg.reply_to_message().map(|parent| OutboundId(parent.id.0))
}

fn payload_of(msg: &Message) -> Option<Payload> {
    let caption = msg.caption().map(str::to_owned);

    if let Some(text) = msg.text() {
        return Some(Payload::Text {
            text: text.to_owned(),
        });
    }
    // Telegram lists photo sizes smallest first.
    if let Some(photos) = msg.photo() {
        let largest = photos.last()?;
        return Some(Payload::Photo {
            file_id: largest.file.id.clone(),
            caption,
        });
    }
    if let Some(sticker) = msg.sticker() {
        return Some(Payload::Sticker {
            file_id: sticker.file.id.clone(),
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(Payload::Voice {
            file_id: voice.file.id.clone(),
            duration_secs: voice.duration.seconds(),
            caption,
        });
    }
    if let Some(animation) = msg.animation() {
        return Some(Payload::Animation {
            file_id: animation.file.id.clone(),
            caption,
        });
    }
    if let Some(video) = msg.video() {
        return Some(Payload::Video {
            file_id: video.file.id.clone(),
            caption,
        });
    }
    if let Some(document) = msg.document() {
        return Some(Payload::Document {
            file_id: document.file.id.clone(),
            caption,
        });
    }
    if let Some(location) = msg.location() {
        return Some(Payload::Location {
            latitude: location.latitude,
            longitude: location.longitude,
        });
    }
    if let Some(contact) = msg.contact() {
        return Some(Payload::Contact {
            phone_number: contact.phone_number.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            vcard: contact.vcard.clone(),
        });
    }
    if let Some(note) = msg.video_note() {
        return Some(Payload::VideoNote {
            file_id: note.file.id.clone(),
        });
    }
    None
}

fn buttons_of(msg: &Message) -> Vec<ControlButton> {
    let Some(markup) = msg.reply_markup() else {
        return Vec::new();
    };
    markup
        .inline_keyboard
        .iter()
        .flatten()
        .map(|button| ControlButton {
            label: button.text.clone(),
            url: match &button.kind {
                InlineKeyboardButtonKind::Url(url) => Some(url.to_string()),
                InlineKeyboardButtonKind::LoginUrl(login) => Some(login.url.to_string()),
                _ => None,
            },
        })
        .collect()
}
