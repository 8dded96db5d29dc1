//! Transport-agnostic message types shared by the admission gate and the relay.
//!
//! The Telegram adapter converts incoming updates into [`InboundMessage`]
//! snapshots; everything downstream of that conversion works on these types
//! only.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable numeric identifier of an end-user (or of the operator).
pub type UserId = i64;

/// Identifier of a message emitted into the operator chat.
///
/// Correlation entries are keyed by this id so that an operator reply to
/// the message can be routed back to the user who sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutboundId(pub i32);

impl fmt::Display for OutboundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who sent an inbound message, as far as the operator header cares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sender {
    /// Public username without the leading `@`, if the user has one.
    pub username: Option<String>,
    /// Display first name.
    pub first_name: String,
}

impl Sender {
    /// Name shown to the operator: `@username` when present, else the first name.
    pub fn display_name(&self) -> String {
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => format!("@{username}"),
            _ => self.first_name.clone(),
        }
    }
}

/// Closed set of relayable payload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Plain text.
    Text,
    /// Photo (largest size).
    Photo,
    /// Sticker.
    Sticker,
    /// Voice message.
    Voice,
    /// Video file.
    Video,
    /// GIF / animation.
    Animation,
    /// Generic document.
    Document,
    /// Map location.
    Location,
    /// Shared contact card.
    Contact,
    /// Round video note.
    VideoNote,
}

impl PayloadKind {
    /// Short human-readable label, used in operator captions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
            Self::Sticker => "sticker",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Animation => "animation",
            Self::Document => "document",
            Self::Location => "location",
            Self::Contact => "contact",
            Self::VideoNote => "video note",
        }
    }

    /// Whether the transport can attach a caption to this kind.
    ///
    /// Kinds without caption support get the operator header as a separate
    /// follow-up note.
    pub fn accepts_caption(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Photo | Self::Voice | Self::Video | Self::Animation | Self::Document
        )
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A relayable message body. Media is referenced by transport file id.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain text.
    Text {
        /// Message text.
        text: String,
    },
    /// Photo.
    Photo {
        /// Transport file id of the largest size.
        file_id: String,
        /// Optional caption.
        caption: Option<String>,
    },
    /// Sticker.
    Sticker {
        /// Transport file id.
        file_id: String,
    },
    /// Voice message.
    Voice {
        /// Transport file id.
        file_id: String,
        /// Duration in seconds.
        duration_secs: u32,
        /// Optional caption.
        caption: Option<String>,
    },
    /// Video.
    Video {
        /// Transport file id.
        file_id: String,
        /// Optional caption.
        caption: Option<String>,
    },
    /// Animation (GIF).
    Animation {
        /// Transport file id.
        file_id: String,
        /// Optional caption.
        caption: Option<String>,
    },
    /// Document.
    Document {
        /// Transport file id.
        file_id: String,
        /// Optional caption.
        caption: Option<String>,
    },
    /// Location.
    Location {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// Contact card.
    Contact {
        /// Phone number.
        phone_number: String,
        /// First name.
        first_name: String,
        /// Last name, if any.
        last_name: Option<String>,
        /// vCard data, if any.
        vcard: Option<String>,
    },
    /// Video note.
    VideoNote {
        /// Transport file id.
        file_id: String,
    },
}

impl Payload {
    /// The kind tag of this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Text { .. } => PayloadKind::Text,
            Self::Photo { .. } => PayloadKind::Photo,
            Self::Sticker { .. } => PayloadKind::Sticker,
            Self::Voice { .. } => PayloadKind::Voice,
            Self::Video { .. } => PayloadKind::Video,
            Self::Animation { .. } => PayloadKind::Animation,
            Self::Document { .. } => PayloadKind::Document,
            Self::Location { .. } => PayloadKind::Location,
            Self::Contact { .. } => PayloadKind::Contact,
            Self::VideoNote { .. } => PayloadKind::VideoNote,
        }
    }

    /// Text body or caption, if the payload carries one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Photo { caption, .. }
            | Self::Voice { caption, .. }
            | Self::Video { caption, .. }
            | Self::Animation { caption, .. }
            | Self::Document { caption, .. } => caption.as_deref(),
            Self::Sticker { .. }
            | Self::Location { .. }
            | Self::Contact { .. }
            | Self::VideoNote { .. } => None,
        }
    }

    /// Short summary recorded in the message history.
    pub fn summary(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Photo { .. } => "sent a photo".to_owned(),
            Self::Sticker { .. } => "sent a sticker".to_owned(),
            Self::Voice { duration_secs, .. } => {
                format!("sent a voice message ({duration_secs}s)")
            }
            Self::Video { .. } => "sent a video".to_owned(),
            Self::Animation { .. } => "sent an animation".to_owned(),
            Self::Document { .. } => "sent a document".to_owned(),
            Self::Location { .. } => "sent a location".to_owned(),
            Self::Contact { .. } => "sent a contact".to_owned(),
            Self::VideoNote { .. } => "sent a video note".to_owned(),
        }
    }

    /// Rebuild this payload with `header` placed in front of its text.
    ///
    /// Returns the payload to emit plus an optional follow-up note for kinds
    /// that cannot carry a caption.
    pub fn with_header(&self, header: &str) -> (Payload, Option<String>) {
        let kind = self.kind();
        let labelled = |caption: &Option<String>, label: String| -> Option<String> {
            match caption.as_deref() {
                Some(c) if !c.is_empty() => Some(format!("{header}({label})\n{c}")),
                _ => Some(format!("{header}({label})")),
            }
        };
        match self {
            Self::Text { text } => (
                Self::Text {
                    text: format!("{header}{text}"),
                },
                None,
            ),
            Self::Photo { file_id, caption } => (
                Self::Photo {
                    file_id: file_id.clone(),
                    caption: labelled(caption, kind.label().to_owned()),
                },
                None,
            ),
            Self::Voice {
                file_id,
                duration_secs,
                caption,
            } => (
                Self::Voice {
                    file_id: file_id.clone(),
                    duration_secs: *duration_secs,
                    caption: labelled(caption, format!("voice, {duration_secs}s")),
                },
                None,
            ),
            Self::Video { file_id, caption } => (
                Self::Video {
                    file_id: file_id.clone(),
                    caption: labelled(caption, kind.label().to_owned()),
                },
                None,
            ),
            Self::Animation { file_id, caption } => (
                Self::Animation {
                    file_id: file_id.clone(),
                    caption: labelled(caption, kind.label().to_owned()),
                },
                None,
            ),
            Self::Document { file_id, caption } => (
                Self::Document {
                    file_id: file_id.clone(),
                    caption: labelled(caption, kind.label().to_owned()),
                },
                None,
            ),
            Self::Sticker { .. }
            | Self::Location { .. }
            | Self::Contact { .. }
            | Self::VideoNote { .. } => (self.clone(), Some(format!("{header}({kind})"))),
        }
    }
}

/// A button of an interactive control surface attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlButton {
    /// Button label.
    pub label: String,
    /// External link the button opens, if it is a link button.
    pub url: Option<String>,
}

/// Snapshot of an inbound message, independent of the transport.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InboundMessage {
    /// Sender details for the operator header.
    pub sender: Sender,
    /// Relayable body; `None` when the message kind is unsupported.
    pub payload: Option<Payload>,
    /// Posted on behalf of a linked channel or business account rather than
    /// by the user in a direct chat.
    pub from_linked_channel: bool,
    /// Sent through an inline bot rather than typed by the user.
    pub via_bot: bool,
    /// Interactive buttons attached to the message.
    pub buttons: Vec<ControlButton>,
}

impl InboundMessage {
    /// Build a plain text message from `sender`.
    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            payload: Some(Payload::Text { text: text.into() }),
            ..Self::default()
        }
    }

    /// Text body or caption of the message, if any.
    pub fn text_content(&self) -> Option<&str> {
        self.payload.as_ref().and_then(Payload::text)
    }
}
