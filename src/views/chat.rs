use crate::{
    error::ValidationError,
    normalize::{
        JsonRecord,
        as_record,
        clamp_announcement_limit,
        clamp_chat_limit,
        normalize_room,
        string_of,
        timestamp_or_now,
    },
    transport::ApiRequest,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Value,
    json,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    pub room: String,
    pub sender_address: String,
    pub body: String,
    pub metadata: JsonRecord,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub lottery_id: Option<String>,
    pub metadata: JsonRecord,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageDto {
    id: u64,
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    sender_address: Value,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    created_at: Value,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementDto {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    lottery_id: Value,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    created_at: Value,
}

pub fn derive_chat_message(dto: ChatMessageDto, now: DateTime<Utc>) -> ChatMessage {
    ChatMessage {
        id: dto.id,
        room: normalize_room(dto.room.as_deref()),
        sender_address: string_of(&dto.sender_address).unwrap_or_default(),
        body: dto.body.unwrap_or_default(),
        metadata: as_record(&dto.metadata).cloned().unwrap_or_default(),
        created_at: timestamp_or_now(&dto.created_at, now),
    }
}

pub fn derive_announcement(dto: AnnouncementDto, now: DateTime<Utc>) -> Announcement {
    Announcement {
        id: dto.id,
        title: dto.title.unwrap_or_default(),
        body: dto.body.unwrap_or_default(),
        lottery_id: string_of(&dto.lottery_id),
        metadata: as_record(&dto.metadata).cloned().unwrap_or_default(),
        created_at: timestamp_or_now(&dto.created_at, now),
    }
}

pub fn chat_messages_request(room: Option<&str>, limit: Option<u32>) -> ApiRequest {
    ApiRequest::get(["chat", "messages"])
        .with_query("room", normalize_room(room))
        .with_query("limit", clamp_chat_limit(limit))
}

pub fn announcements_request(limit: Option<u32>, lottery_id: Option<&str>) -> ApiRequest {
    let request = ApiRequest::get(["chat", "announcements"])
        .with_query("limit", clamp_announcement_limit(limit));
    match lottery_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => request.with_query("lottery_id", id),
        None => request,
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PostChatMessage {
    pub address: String,
    pub body: String,
    pub room: Option<String>,
    pub metadata: Option<JsonRecord>,
}

impl PostChatMessage {
    pub fn to_request(&self) -> Result<ApiRequest, ValidationError> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(ValidationError::invalid("address", "sender address is required"));
        }
        let body = self.body.trim();
        if body.is_empty() {
            return Err(ValidationError::invalid("body", "message must not be empty"));
        }
        Ok(ApiRequest::post(
            ["chat", "messages"],
            json!({
                "address": address,
                "body": body,
                "room": normalize_room(self.room.as_deref()),
                "metadata": self.metadata,
            }),
        ))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PostAnnouncement {
    pub title: String,
    pub body: String,
    pub lottery_id: Option<String>,
    pub metadata: Option<JsonRecord>,
}

#[derive(Serialize)]
struct AnnouncementRequestBody<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    lottery_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a JsonRecord>,
}

impl PostAnnouncement {
    pub fn to_request(&self) -> Result<ApiRequest, ValidationError> {
        let title = self.title.trim();
        let body = self.body.trim();
        if title.is_empty() || body.is_empty() {
            return Err(ValidationError::invalid(
                "announcement",
                "title and body are required",
            ));
        }
        let payload = AnnouncementRequestBody {
            title,
            body,
            lottery_id: self
                .lottery_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            metadata: self.metadata.as_ref(),
        };
        let body = serde_json::to_value(payload)
            .map_err(|e| ValidationError::invalid("announcement", e.to_string()))?;
        Ok(ApiRequest::post(["chat", "announcements"], body))
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-04-12T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn chat_messages_request__normalizes_room_and_clamps_limit() {
        // when
        let request = chat_messages_request(Some(" Global "), Some(5000));

        // then
        assert_eq!(request.query_value("room"), Some("global"));
        assert_eq!(request.query_value("limit"), Some("200"));
        assert_eq!(chat_messages_request(None, Some(0)).query_value("limit"), Some("1"));
    }

    #[test]
    fn derive_chat_message__normalizes_room_and_defaults() {
        // given
        let dto: ChatMessageDto = serde_json::from_value(json!({
            "id": 17,
            "room": " Global ",
            "sender_address": "0xabc",
            "body": "gm",
            "metadata": ["not", "a", "record"],
            "created_at": "2024-04-12 10:00:00"
        }))
        .unwrap();

        // when
        let message = derive_chat_message(dto, now());

        // then
        assert_eq!(message.room, "global");
        assert_eq!(message.sender_address, "0xabc");
        assert!(message.metadata.is_empty());
        assert_eq!(message.created_at, "2024-04-12T10:00:00.000Z");
    }

    #[test]
    fn derive_announcement__missing_created_at_uses_now() {
        // given
        let dto: AnnouncementDto =
            serde_json::from_value(json!({ "id": 1, "lottery_id": 3 })).unwrap();

        // when
        let announcement = derive_announcement(dto, now());

        // then
        assert_eq!(announcement.title, "");
        assert_eq!(announcement.lottery_id.as_deref(), Some("3"));
        assert_eq!(announcement.created_at, "2024-04-12T12:00:00.000Z");
    }

    #[test]
    fn post_chat_message__rejects_blank_body() {
        // given
        let input = PostChatMessage {
            address: "0xabc".to_string(),
            body: "   ".to_string(),
            ..PostChatMessage::default()
        };

        // then
        assert!(input.to_request().is_err());
    }

    #[test]
    fn post_chat_message__trims_and_routes_to_room() {
        // given
        let input = PostChatMessage {
            address: " 0xabc ".to_string(),
            body: " hello ".to_string(),
            room: Some("Lottery-1".to_string()),
            metadata: None,
        };

        // when
        let request = input.to_request().unwrap();

        // then
        assert_eq!(request.path(), "/chat/messages");
        assert_eq!(
            request.body,
            Some(json!({
                "address": "0xabc",
                "body": "hello",
                "room": "lottery-1",
                "metadata": null,
            }))
        );
    }

    #[test]
    fn post_announcement__omits_blank_lottery_id() {
        // given
        let input = PostAnnouncement {
            title: "Draw".to_string(),
            body: "Tonight".to_string(),
            lottery_id: Some("  ".to_string()),
            metadata: None,
        };

        // when
        let request = input.to_request().unwrap();

        // then
        assert_eq!(request.body, Some(json!({ "title": "Draw", "body": "Tonight" })));
        assert_eq!(
            announcements_request(None, Some(" 4 ")).query_value("lottery_id"),
            Some("4")
        );
    }
}
