//! [`Transport`] implementation backed by the Telegram Bot API.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::RequestError;
use tracing::warn;

use crate::relay::transport::{DeliveryError, Transport};
use crate::types::{OutboundId, Payload, PayloadKind, UserId};

/// Bot API error marker for users whose privacy settings block voice messages.
const VOICE_FORBIDDEN_MARKER: &str = "VOICE_MESSAGES_FORBIDDEN";

/// Sends payloads through a teloxide [`Bot`].
///
/// Media is re-sent by file id, so nothing is downloaded.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    operator_chat: ChatId,
}

impl TelegramTransport {
    /// Create a transport whose operator inbox is `operator_chat`.
    pub fn new(bot: Bot, operator_chat: ChatId) -> Self {
        Self { bot, operator_chat }
    }

    async fn send(&self, chat: ChatId, payload: &Payload) -> Result<Message, RequestError> {
        let bot = &self.bot;
        match payload {
            Payload::Text { text } => bot.send_message(chat, text).await,
            Payload::Photo { file_id, caption } => {
                let req = bot.send_photo(chat, InputFile::file_id(file_id.as_str()));
                match caption {
                    Some(c) => req.caption(c).await,
                    None => req.await,
                }
            }
            Payload::Sticker { file_id } => {
                bot.send_sticker(chat, InputFile::file_id(file_id.as_str()))
                    .await
            }
            Payload::Voice {
                file_id, caption, ..
            } => {
                let req = bot.send_voice(chat, InputFile::file_id(file_id.as_str()));
                match caption {
                    Some(c) => req.caption(c).await,
                    None => req.await,
                }
            }
            Payload::Video { file_id, caption } => {
                let req = bot.send_video(chat, InputFile::file_id(file_id.as_str()));
                match caption {
                    Some(c) => req.caption(c).await,
                    None => req.await,
                }
            }
            Payload::Animation { file_id, caption } => {
                let req = bot.send_animation(chat, InputFile::file_id(file_id.as_str()));
                match caption {
                    Some(c) => req.caption(c).await,
                    None => req.await,
                }
            }
            Payload::Document { file_id, caption } => {
                let req = bot.send_document(chat, InputFile::file_id(file_id.as_str()));
                match caption {
                    Some(c) => req.caption(c).await,
                    None => req.await,
                }
            }
            Payload::Location {
                latitude,
                longitude,
            } => bot.send_location(chat, *latitude, *longitude).await,
            Payload::Contact {
                phone_number,
                first_name,
                last_name,
                vcard,
            } => {
                let mut req = bot.send_contact(chat, phone_number, first_name);
                if let Some(last) = last_name {
                    req = req.last_name(last);
                }
                if let Some(card) = vcard {
                    req = req.vcard(card);
                }
                req.await
            }
            Payload::VideoNote { file_id } => {
                bot.send_video_note(chat, InputFile::file_id(file_id.as_str()))
                    .await
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_to_operator(&self, payload: &Payload) -> Result<OutboundId, DeliveryError> {
        match self.send(self.operator_chat, payload).await {
            Ok(sent) => Ok(OutboundId(sent.id.0)),
            Err(e) => {
                warn!(error = %e, kind = %payload.kind(), "operator delivery failed");
                Err(classify_error(payload.kind(), &e.to_string()))
            }
        }
    }

    async fn send_to_user(&self, user_id: UserId, payload: &Payload) -> Result<(), DeliveryError> {
        match self.send(ChatId(user_id), payload).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(user_id, error = %e, kind = %payload.kind(), "user delivery failed");
                Err(classify_error(payload.kind(), &e.to_string()))
            }
        }
    }
}

/// Map a Bot API error description onto a [`DeliveryError`].
pub fn classify_error(kind: PayloadKind, description: &str) -> DeliveryError {
    if description
        .to_ascii_uppercase()
        .contains(VOICE_FORBIDDEN_MARKER)
    {
        return DeliveryError::KindForbidden(kind);
    }
    DeliveryError::Other(description.to_owned())
}
