//! Wire shapes exchanged with the remote bot service.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Activity type the session surfaces; anything else is logged and skipped.
pub const MESSAGE_TYPE: &str = "message";

const HERO_CARD: &str = "application/vnd.microsoft.card.hero";
const THUMBNAIL_CARD: &str = "application/vnd.microsoft.card.thumbnail";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One unit of conversation traffic received from the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub service_url: Option<String>,
    pub channel_id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub from: ChannelAccount,
    pub conversation: Option<ConversationAccount>,
    pub recipient: Option<ChannelAccount>,
    pub text: Option<String>,
    pub reply_to_id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
    pub channel_data: Option<Value>,
}

impl Activity {
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.kind == MESSAGE_TYPE
    }

    /// Message text, empty when the activity carries none.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Cards among the attachments, skipping other content types.
    pub fn cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.attachments.iter().filter_map(Attachment::card)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Attachment {
    #[serde(deserialize_with = "null_as_default")]
    pub content_type: String,
    pub content: Option<Value>,
    pub content_url: Option<String>,
    pub name: Option<String>,
}

impl Attachment {
    /// Typed view of hero and thumbnail cards. Malformed card bodies yield `None`.
    #[must_use]
    pub fn card(&self) -> Option<Card> {
        let kind = match self.content_type.as_str() {
            HERO_CARD => CardKind::Hero,
            THUMBNAIL_CARD => CardKind::Thumbnail,
            _ => return None,
        };
        let content = self.content.clone()?;
        let mut card: Card = serde_json::from_value(content).ok()?;
        card.kind = kind;
        Some(card)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardKind {
    #[default]
    Hero,
    Thumbnail,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Card {
    #[serde(skip)]
    pub kind: CardKind,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub text: Option<String>,
    pub images: Vec<CardImage>,
    pub buttons: Vec<CardAction>,
    pub tap: Option<CardAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardImage {
    pub url: String,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub value: Option<Value>,
}

/// Body of a successful `GET .../activities`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActivitySet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub activities: Vec<Activity>,
    #[serde(default, deserialize_with = "opaque_watermark")]
    pub watermark: Option<String>,
}

/// Body of a successful `POST /conversations`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationGrant {
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    pub token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Body of `POST .../activities`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingActivity {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
    pub from: ChannelAccount,
}

impl OutgoingActivity {
    #[must_use]
    pub fn message(text: impl Into<String>, from: ChannelAccount) -> Self {
        Self {
            kind: MESSAGE_TYPE,
            text: text.into(),
            from,
        }
    }
}

/// Services send `null` for absent fields as often as they omit them.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Watermarks are opaque; some services send them as numbers, so both
/// strings and numbers are kept as their textual form.
fn opaque_watermark<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "watermark must be a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_activity() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "message",
            "id": "c1|0001",
            "timestamp": "2026-01-01T00:00:00Z",
            "serviceUrl": "https://example.invalid",
            "channelId": "directline",
            "from": { "id": "bot1", "name": "Bot" },
            "conversation": { "id": "c1" },
            "recipient": { "id": "u1", "name": "user" },
            "text": "hello",
            "replyToId": "c1|0000",
            "channelData": { "clientActivityId": "x" }
        }))
        .unwrap();

        assert!(activity.is_message());
        assert_eq!(activity.text(), "hello");
        assert_eq!(activity.from.id, "bot1");
        assert_eq!(activity.service_url.as_deref(), Some("https://example.invalid"));
        assert_eq!(activity.reply_to_id.as_deref(), Some("c1|0000"));
        assert_eq!(activity.conversation.unwrap().id, "c1");
        assert_eq!(activity.channel_data.unwrap()["clientActivityId"], "x");
    }

    #[test]
    fn sparse_activity_uses_defaults() {
        let activity: Activity =
            serde_json::from_value(json!({ "type": "typing", "from": { "id": "bot1" } })).unwrap();
        assert!(!activity.is_message());
        assert_eq!(activity.text(), "");
        assert!(activity.from.name.is_none());
        assert!(activity.attachments.is_empty());
    }

    #[test]
    fn explicit_nulls_decode_as_defaults() {
        let set: ActivitySet = serde_json::from_value(json!({
            "watermark": "4",
            "activities": [
                { "type": "message", "text": "hi", "from": null, "attachments": null },
                { "type": null, "from": { "id": null, "name": "Bot" } },
                { "type": "message", "attachments": [{ "contentType": null }] }
            ]
        }))
        .unwrap();

        assert_eq!(set.watermark.as_deref(), Some("4"));
        assert_eq!(set.activities.len(), 3);
        assert_eq!(set.activities[0].from, ChannelAccount::default());
        assert!(set.activities[0].attachments.is_empty());
        assert_eq!(set.activities[1].kind, "");
        assert_eq!(set.activities[1].from.id, "");
        assert_eq!(set.activities[2].attachments[0].content_type, "");

        let set: ActivitySet =
            serde_json::from_value(json!({ "activities": null, "watermark": 7 })).unwrap();
        assert!(set.activities.is_empty());
        assert_eq!(set.watermark.as_deref(), Some("7"));
    }

    #[test]
    fn watermark_accepts_string_and_number() {
        let set: ActivitySet =
            serde_json::from_value(json!({ "watermark": "5", "activities": [] })).unwrap();
        assert_eq!(set.watermark.as_deref(), Some("5"));

        let set: ActivitySet = serde_json::from_value(json!({ "watermark": 12 })).unwrap();
        assert_eq!(set.watermark.as_deref(), Some("12"));
        assert!(set.activities.is_empty());

        let set: ActivitySet = serde_json::from_value(json!({ "watermark": null })).unwrap();
        assert!(set.watermark.is_none());

        assert!(serde_json::from_value::<ActivitySet>(json!({ "watermark": [1] })).is_err());
    }

    #[test]
    fn hero_and_thumbnail_cards_are_typed() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "message",
            "attachments": [
                {
                    "contentType": "application/vnd.microsoft.card.hero",
                    "content": {
                        "title": "Pick one",
                        "images": [{ "url": "https://img.invalid/a.png" }],
                        "buttons": [{ "type": "imBack", "title": "Yes", "value": "yes" }]
                    }
                },
                {
                    "contentType": "application/vnd.microsoft.card.thumbnail",
                    "content": { "subtitle": "small" }
                },
                { "contentType": "image/png", "contentUrl": "https://img.invalid/b.png" }
            ]
        }))
        .unwrap();

        let cards: Vec<Card> = activity.cards().collect();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].kind, CardKind::Hero);
        assert_eq!(cards[0].title.as_deref(), Some("Pick one"));
        assert_eq!(cards[0].buttons[0].kind, "imBack");
        assert_eq!(cards[1].kind, CardKind::Thumbnail);
        assert_eq!(cards[1].subtitle.as_deref(), Some("small"));
    }

    #[test]
    fn outgoing_message_shape() {
        let body = serde_json::to_value(OutgoingActivity::message(
            "hi",
            ChannelAccount::new("u1", "user"),
        ))
        .unwrap();
        assert_eq!(
            body,
            json!({ "type": "message", "text": "hi", "from": { "id": "u1", "name": "user" } })
        );
    }
}
