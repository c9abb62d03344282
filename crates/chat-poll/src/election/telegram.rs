//! Telegram Bot API webhook payloads.
//!
//! Only the fields the bot reads are modelled. Replies are returned in the
//! webhook response body as a Bot API method call, so the service never has to
//! call back into the API itself.

use serde::{Deserialize, Serialize};

use super::commands::{ChatRequest, Command, Reply, TextFormat};
use super::domain::{Participant, UserId};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub new_chat_members: Vec<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    pub fn participant(&self) -> Participant {
        Participant::new(UserId(self.id), self.full_name(), self.username.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Where the answer to an inbound command goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    Chat { chat_id: i64, message_id: i64 },
    Callback { query_id: String },
}

/// What an update means for the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command {
        request: ChatRequest,
        target: ReplyTarget,
    },
    MembersJoined(Vec<UserId>),
    Ignored,
}

impl Update {
    pub fn classify(self) -> Inbound {
        if let Some(query) = self.callback_query {
            let Some(command) = query.data.as_deref().and_then(Command::parse_callback) else {
                return Inbound::Ignored;
            };
            return Inbound::Command {
                request: ChatRequest {
                    caller: query.from.participant(),
                    chat_id: query.message.as_ref().map(|message| message.chat.id),
                    command,
                },
                target: ReplyTarget::Callback { query_id: query.id },
            };
        }

        let Some(message) = self.message else {
            return Inbound::Ignored;
        };

        if !message.new_chat_members.is_empty() {
            return Inbound::MembersJoined(
                message
                    .new_chat_members
                    .iter()
                    .map(|member| UserId(member.id))
                    .collect(),
            );
        }

        let command = message.text.as_deref().and_then(Command::parse_text);
        match (command, message.from) {
            (Some(command), Some(from)) => Inbound::Command {
                request: ChatRequest {
                    caller: from.participant(),
                    chat_id: Some(message.chat.id),
                    command,
                },
                target: ReplyTarget::Chat {
                    chat_id: message.chat.id,
                    message_id: message.message_id,
                },
            },
            _ => Inbound::Ignored,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// Bot API method returned as the webhook response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method")]
pub enum WebhookReply {
    #[serde(rename = "sendMessage")]
    SendMessage {
        chat_id: i64,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parse_mode: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_to_message_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_markup: Option<InlineKeyboardMarkup>,
    },
    #[serde(rename = "answerCallbackQuery")]
    AnswerCallbackQuery {
        callback_query_id: String,
        text: String,
    },
}

impl WebhookReply {
    pub fn render(reply: Reply, target: ReplyTarget) -> Self {
        match target {
            ReplyTarget::Callback { query_id } => Self::AnswerCallbackQuery {
                callback_query_id: query_id,
                text: reply.text().to_string(),
            },
            ReplyTarget::Chat {
                chat_id,
                message_id,
            } => match reply {
                Reply::Message {
                    text,
                    format,
                    ballot,
                } => {
                    let reply_markup = (!ballot.is_empty()).then(|| InlineKeyboardMarkup {
                        inline_keyboard: ballot
                            .into_iter()
                            .map(|option| {
                                vec![InlineKeyboardButton {
                                    text: option.label,
                                    callback_data: option.candidate_id.to_string(),
                                }]
                            })
                            .collect(),
                    });
                    Self::SendMessage {
                        chat_id,
                        text,
                        parse_mode: match format {
                            TextFormat::Html => Some("HTML"),
                            TextFormat::Plain => None,
                        },
                        reply_to_message_id: Some(message_id),
                        reply_markup,
                    }
                }
                Reply::Notice(text) => Self::SendMessage {
                    chat_id,
                    text,
                    parse_mode: None,
                    reply_to_message_id: Some(message_id),
                    reply_markup: None,
                },
            },
        }
    }
}
