#![allow(non_snake_case)]
use serde_json::json;
use supra_status_client::{
    test_helpers::TestContext,
    views::{
        AccountProfileUpdate,
        ChecklistComplete,
        PostAnnouncement,
        PostChatMessage,
    },
};

#[tokio::test]
async fn post_chat_message__normalizes_room_outgoing_and_echoed() {
    let ctx = TestContext::new();
    // given
    ctx.transport.queue_ok(json!({
        "id": 11,
        "room": " Global ",
        "sender_address": "0xabc",
        "body": "gm",
        "created_at": "2024-04-12T11:30:00Z"
    }));
    let message = PostChatMessage {
        address: "0xabc".to_string(),
        body: "gm".to_string(),
        room: Some(" Global ".to_string()),
        metadata: None,
    };

    // when
    let echoed = ctx.client.post_chat_message(&message).await.unwrap();

    // then
    let requests = ctx.transport.requests();
    let sent = &requests[0];
    assert_eq!(sent.body.as_ref().unwrap()["room"], json!("global"));
    assert_eq!(echoed.room, "global");
    assert_eq!(echoed.created_at, "2024-04-12T11:30:00.000Z");
}

#[tokio::test]
async fn chat_messages__queries_normalized_room() {
    let ctx = TestContext::new();
    // given
    ctx.transport.queue_ok(json!([
        { "id": 1, "room": "GLOBAL", "sender_address": "0xa", "body": "one" },
        { "id": 2, "sender_address": "0xb", "body": "two" }
    ]));

    // when
    let messages = ctx.client.chat_messages(Some(" Global "), Some(500)).await.unwrap();

    // then
    let requests = ctx.transport.requests();
    let sent = &requests[0];
    assert_eq!(sent.query_value("room"), Some("global"));
    assert_eq!(sent.query_value("limit"), Some("200"));
    let rooms: Vec<&str> = messages.iter().map(|m| m.room.as_str()).collect();
    assert_eq!(rooms, vec!["global", "global"]);
}

#[tokio::test]
async fn post_chat_message__blank_body_never_reaches_transport() {
    let ctx = TestContext::new();

    // when
    let result = ctx
        .client
        .post_chat_message(&PostChatMessage {
            address: "0xabc".to_string(),
            body: " ".to_string(),
            ..PostChatMessage::default()
        })
        .await;

    // then
    assert!(result.unwrap_err().is_validation());
    assert_eq!(ctx.transport.request_count(), 0);
}

#[tokio::test]
async fn announcements__filter_by_lottery_and_post() {
    let ctx = TestContext::new();
    // given
    ctx.transport.queue_ok(json!({
        "announcements": [{ "id": 3, "title": "Draw", "body": "Tonight", "lottery_id": 2 }]
    }));
    ctx.transport.queue_ok(json!({ "id": 4, "title": "Winner", "body": "Congrats" }));

    // when
    let listed = ctx.client.announcements(None, Some("2")).await.unwrap();
    let posted = ctx
        .client
        .post_announcement(&PostAnnouncement {
            title: " Winner ".to_string(),
            body: "Congrats".to_string(),
            ..PostAnnouncement::default()
        })
        .await
        .unwrap();

    // then
    let requests = ctx.transport.requests();
    assert_eq!(requests[0].query_value("lottery_id"), Some("2"));
    assert_eq!(requests[0].query_value("limit"), Some("20"));
    assert_eq!(listed[0].lottery_id.as_deref(), Some("2"));
    assert_eq!(requests[1].body, Some(json!({ "title": "Winner", "body": "Congrats" })));
    assert_eq!(posted.id, 4);
}

#[tokio::test]
async fn account_profile__unknown_account_is_none() {
    let ctx = TestContext::new();
    // given
    ctx.transport.queue_json(404, json!({ "detail": "Account not found" }));

    // when
    let profile = ctx.client.account_profile("0xabc").await.unwrap();

    // then
    assert_eq!(profile, None);
    assert_eq!(ctx.transport.paths(), vec!["/accounts/0xabc"]);
}

#[tokio::test]
async fn upsert_account_profile__puts_partial_update() {
    let ctx = TestContext::new();
    // given
    ctx.transport.queue_ok(json!({
        "address": "0xabc",
        "nickname": "lucky",
        "avatar_kind": "emoji",
        "avatar_value": "🍀",
        "created_at": "2024-03-01T00:00:00Z",
        "updated_at": "2024-04-12T11:00:00Z"
    }));
    let update = AccountProfileUpdate {
        nickname: Some(Some("lucky".to_string())),
        ..AccountProfileUpdate::default()
    };

    // when
    let profile = ctx.client.upsert_account_profile("0xabc", &update).await.unwrap();

    // then
    assert_eq!(ctx.transport.requests()[0].body, Some(json!({ "nickname": "lucky" })));
    assert_eq!(profile.avatar.kind, "emoji");
    assert_eq!(profile.updated_at, "2024-04-12T11:00:00.000Z");
}

#[tokio::test]
async fn checklist__blank_address_is_empty_without_request() {
    let ctx = TestContext::new();

    // when
    let checklist = ctx.client.checklist("  ").await.unwrap();
    let achievements = ctx.client.achievements("").await.unwrap();

    // then
    assert!(checklist.tasks.is_empty());
    assert!(achievements.achievements.is_empty());
    assert_eq!(ctx.transport.request_count(), 0);
}

#[tokio::test]
async fn complete_checklist_task__posts_to_task_path() {
    let ctx = TestContext::new();
    // given
    ctx.transport.queue_ok(json!({
        "task": { "code": "day-1", "title": "Buy a ticket", "day_index": 1 },
        "completed": true,
        "completed_at": "2024-04-12T11:45:00Z",
        "reward_claimed": true
    }));
    let body = ChecklistComplete {
        reward_claimed: Some(true),
        ..ChecklistComplete::default()
    };

    // when
    let entry = ctx
        .client
        .complete_checklist_task("0xabc", "day-1", &body)
        .await
        .unwrap();

    // then
    let requests = ctx.transport.requests();
    let request = &requests[0];
    assert_eq!(request.path(), "/progress/0xabc/checklist/day-1/complete");
    assert_eq!(request.body, Some(json!({ "reward_claimed": true })));
    assert!(entry.completed);
    assert_eq!(entry.task.day_index, 1);
}

#[tokio::test]
async fn achievements__not_found_is_empty_for_lowercased_address() {
    let ctx = TestContext::new();
    // given
    ctx.transport.queue_json(404, json!({ "detail": "missing" }));

    // when
    let status = ctx.client.achievements("0xABC").await.unwrap();

    // then
    assert_eq!(status.address, "0xabc");
    assert!(status.achievements.is_empty());
}
