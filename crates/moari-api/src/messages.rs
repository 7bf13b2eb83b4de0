use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{debug, info};
use uuid::Uuid;

use moari_db::models::NewMessage;
use moari_types::Moment;
use moari_types::api::{Claims, SendMessageRequest, SendMessageResponse};
use moari_types::models::{Message, UserProfile, display_name_or_local_part};

use crate::auth::{AppState, run_db};
use crate::conversations;
use crate::error::ApiError;
use crate::policy::{self, Action};

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let receiver_id = req
        .receiver_uid
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("받는 사람이 지정되지 않았습니다.".into()))?;
    let body = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("메시지 내용이 비어 있습니다.".into()))?;

    let message_id = Uuid::new_v4().to_string();
    let mid = message_id.clone();
    let sender_id = claims.sub;

    run_db(&state, move |db| {
        db.insert_message(&NewMessage {
            id: &mid,
            sender_id: &sender_id,
            receiver_id: &receiver_id,
            body: &body,
            club_id: req.club_id.as_deref(),
            club_name: req.club_name.as_deref(),
            created_at: Moment::now(),
        })
        .map_err(|e| ApiError::internal("메시지 전송 중 오류가 발생했습니다.", e))?;
        debug!("Message {} sent {} -> {}", mid, sender_id, receiver_id);
        Ok(())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "메시지가 전송되었습니다.".into(),
            message_id,
        }),
    ))
}

/// One summary per peer the user has exchanged messages with, newest first.
pub async fn get_conversations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if !policy::authorize(&claims.sub, Action::ListConversations { user_id: &user_id }).is_allowed() {
        return Err(ApiError::PermissionDenied(
            "다른 사용자의 대화 목록은 조회할 수 없습니다.".into(),
        ));
    }

    let uid = user_id.clone();
    let (received, sent) = run_db(&state, move |db| {
        let failed = |e: anyhow::Error| ApiError::internal("대화 목록 조회 중 오류가 발생했습니다.", e);
        let received = db.messages_received_by(&uid).map_err(failed)?;
        let sent = db.messages_sent_by(&uid).map_err(failed)?;
        Ok((received, sent))
    })
    .await?;

    debug!(
        "Conversations for {}: {} received, {} sent",
        user_id,
        received.len(),
        sent.len()
    );

    let received: Vec<Message> = received.into_iter().map(Message::from).collect();
    let sent: Vec<Message> = sent.into_iter().map(Message::from).collect();

    Ok(Json(conversations::summarize(&user_id, &received, &sent)))
}

/// Chat history between `sender_id` (the peer) and `receiver_id` (the
/// caller), oldest first. Opening it marks the peer's unread messages to the
/// caller as read.
pub async fn get_chat(
    State(state): State<AppState>,
    Path((sender_id, receiver_id)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if !policy::authorize(&claims.sub, Action::ReadChat { reader_id: &receiver_id }).is_allowed() {
        return Err(ApiError::PermissionDenied(
            "다른 사용자의 대화는 조회할 수 없습니다.".into(),
        ));
    }

    let (reader, peer) = (receiver_id, sender_id);
    let (rows, marked) = run_db(&state, move |db| {
        db.open_conversation(&reader, &peer)
            .map_err(|e| ApiError::internal("채팅 조회 중 오류가 발생했습니다.", e))
    })
    .await?;

    if marked > 0 {
        info!("Marked {} message(s) read for {}", marked, claims.sub);
    }

    let mut messages: Vec<Message> = rows.into_iter().map(Message::from).collect();
    conversations::sort_chronologically(&mut messages);

    Ok(Json(messages))
}

/// Public profile lookup used to label conversations.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_db(&state, move |db| {
        db.get_user_by_id(&user_id)
            .map_err(|e| ApiError::internal("사용자 정보 조회 중 오류가 발생했습니다.", e))
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("사용자를 찾을 수 없습니다.".into()))?;

    Ok(Json(UserProfile {
        display_name: display_name_or_local_part(user.display_name.as_deref(), &user.email),
        uid: user.id,
        email: user.email,
    }))
}
