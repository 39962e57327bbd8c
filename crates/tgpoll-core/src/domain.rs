//! Telegram update model.
//!
//! An update is a JSON object with an `update_id` and exactly one kind-tagged
//! payload. We parse only the identifiers the filters need and keep the raw object
//! around so downstream consumers get the update exactly as Telegram sent it.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{errors::Error, Result};

/// Update kinds accepted in `allowed_updates`, in identifier-extraction priority order.
pub const UPDATE_KINDS: &[&str] = &[
    "message",
    "edited_message",
    "channel_post",
    "edited_channel_post",
    "callback_query",
    "inline_query",
    "chosen_inline_result",
    "shipping_query",
    "pre_checkout_query",
    "poll",
    "poll_answer",
    "chat_member",
    "my_chat_member",
    "chat_join_request",
];

/// `{ "id": ... }` object. Telegram sends numeric ids; strings are tolerated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Entity {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
}

/// Payload of kinds that live inside a chat (messages, posts, member updates, join requests).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChatScoped {
    #[serde(default, deserialize_with = "lenient")]
    pub chat: Option<Entity>,
    #[serde(default, deserialize_with = "lenient")]
    pub from: Option<Entity>,
}

/// Payload of kinds that only know the sender (inline queries, payments).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FromScoped {
    #[serde(default, deserialize_with = "lenient")]
    pub from: Option<Entity>,
}

/// `callback_query`: sender at the top level, chat on the originating message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    #[serde(default, deserialize_with = "lenient")]
    pub from: Option<Entity>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<ChatScoped>,
}

/// `poll_answer`: the voter sits under `user`, not `from`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PollAnswer {
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<Entity>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    Message(ChatScoped),
    EditedMessage(ChatScoped),
    ChannelPost(ChatScoped),
    EditedChannelPost(ChatScoped),
    CallbackQuery(CallbackQuery),
    InlineQuery(FromScoped),
    ChosenInlineResult(FromScoped),
    ShippingQuery(FromScoped),
    PreCheckoutQuery(FromScoped),
    Poll,
    PollAnswer(PollAnswer),
    ChatMember(ChatScoped),
    MyChatMember(ChatScoped),
    ChatJoinRequest(ChatScoped),
    /// A kind this crate does not model; carries no identifiers.
    Other(String),
}

impl UpdateKind {
    /// The Bot API field name of this kind.
    pub fn tag(&self) -> &str {
        match self {
            UpdateKind::Message(_) => "message",
            UpdateKind::EditedMessage(_) => "edited_message",
            UpdateKind::ChannelPost(_) => "channel_post",
            UpdateKind::EditedChannelPost(_) => "edited_channel_post",
            UpdateKind::CallbackQuery(_) => "callback_query",
            UpdateKind::InlineQuery(_) => "inline_query",
            UpdateKind::ChosenInlineResult(_) => "chosen_inline_result",
            UpdateKind::ShippingQuery(_) => "shipping_query",
            UpdateKind::PreCheckoutQuery(_) => "pre_checkout_query",
            UpdateKind::Poll => "poll",
            UpdateKind::PollAnswer(_) => "poll_answer",
            UpdateKind::ChatMember(_) => "chat_member",
            UpdateKind::MyChatMember(_) => "my_chat_member",
            UpdateKind::ChatJoinRequest(_) => "chat_join_request",
            UpdateKind::Other(tag) => tag.as_str(),
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        match self {
            UpdateKind::Message(p)
            | UpdateKind::EditedMessage(p)
            | UpdateKind::ChannelPost(p)
            | UpdateKind::EditedChannelPost(p)
            | UpdateKind::ChatMember(p)
            | UpdateKind::MyChatMember(p)
            | UpdateKind::ChatJoinRequest(p) => entity_id(&p.chat),
            UpdateKind::CallbackQuery(q) => q.message.as_ref().and_then(|m| entity_id(&m.chat)),
            UpdateKind::InlineQuery(_)
            | UpdateKind::ChosenInlineResult(_)
            | UpdateKind::ShippingQuery(_)
            | UpdateKind::PreCheckoutQuery(_)
            | UpdateKind::Poll
            | UpdateKind::PollAnswer(_)
            | UpdateKind::Other(_) => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            UpdateKind::Message(p)
            | UpdateKind::EditedMessage(p)
            | UpdateKind::ChannelPost(p)
            | UpdateKind::EditedChannelPost(p)
            | UpdateKind::ChatMember(p)
            | UpdateKind::MyChatMember(p)
            | UpdateKind::ChatJoinRequest(p) => entity_id(&p.from),
            UpdateKind::CallbackQuery(q) => entity_id(&q.from),
            UpdateKind::InlineQuery(p)
            | UpdateKind::ChosenInlineResult(p)
            | UpdateKind::ShippingQuery(p)
            | UpdateKind::PreCheckoutQuery(p) => entity_id(&p.from),
            UpdateKind::PollAnswer(a) => entity_id(&a.user),
            UpdateKind::Poll | UpdateKind::Other(_) => None,
        }
    }

    fn parse(tag: &str, payload: &Value) -> Self {
        match tag {
            "message" => UpdateKind::Message(payload_of(payload)),
            "edited_message" => UpdateKind::EditedMessage(payload_of(payload)),
            "channel_post" => UpdateKind::ChannelPost(payload_of(payload)),
            "edited_channel_post" => UpdateKind::EditedChannelPost(payload_of(payload)),
            "callback_query" => UpdateKind::CallbackQuery(payload_of(payload)),
            "inline_query" => UpdateKind::InlineQuery(payload_of(payload)),
            "chosen_inline_result" => UpdateKind::ChosenInlineResult(payload_of(payload)),
            "shipping_query" => UpdateKind::ShippingQuery(payload_of(payload)),
            "pre_checkout_query" => UpdateKind::PreCheckoutQuery(payload_of(payload)),
            "poll" => UpdateKind::Poll,
            "poll_answer" => UpdateKind::PollAnswer(payload_of(payload)),
            "chat_member" => UpdateKind::ChatMember(payload_of(payload)),
            "my_chat_member" => UpdateKind::MyChatMember(payload_of(payload)),
            "chat_join_request" => UpdateKind::ChatJoinRequest(payload_of(payload)),
            other => UpdateKind::Other(other.to_string()),
        }
    }
}

/// One update as returned by `getUpdates`.
///
/// Serializes back to the raw object it was parsed from.
#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub kind: UpdateKind,
    raw: Map<String, Value>,
}

impl Update {
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(raw) = value else {
            return Err(Error::External("update is not a JSON object".to_string()));
        };

        let update_id = raw
            .get("update_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::External("update has no numeric update_id".to_string()))?;

        // Known kinds win over unknown keys; among known kinds, priority order decides.
        let kind = UPDATE_KINDS
            .iter()
            .find_map(|tag| raw.get(*tag).map(|payload| UpdateKind::parse(tag, payload)))
            .unwrap_or_else(|| {
                let tag = raw
                    .keys()
                    .find(|k| k.as_str() != "update_id")
                    .cloned()
                    .unwrap_or_default();
                UpdateKind::Other(tag)
            });

        Ok(Self {
            update_id,
            kind,
            raw,
        })
    }

    pub fn kind_tag(&self) -> &str {
        self.kind.tag()
    }
}

/// Parse a `getUpdates` result array. Elements that are not updates (no numeric
/// `update_id`, not an object) are dropped instead of failing the whole batch.
pub fn parse_update_list(values: Vec<Value>) -> Vec<Update> {
    values
        .into_iter()
        .filter_map(|value| match Update::from_value(value) {
            Ok(update) => Some(update),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed update");
                None
            }
        })
        .collect()
}

impl<'de> Deserialize<'de> for Update {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Update::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Update {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.raw.serialize(serializer)
    }
}

fn entity_id(entity: &Option<Entity>) -> Option<&str> {
    entity.as_ref().and_then(|e| e.id.as_deref())
}

fn payload_of<T: DeserializeOwned + Default>(payload: &Value) -> T {
    serde_json::from_value(payload.clone()).unwrap_or_default()
}

/// Accept any JSON for the field; a shape we cannot read counts as absent.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s),
        _ => None,
    })
}
