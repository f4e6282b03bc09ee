use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use study_db::models::{parse_datetime, NotificationRow};
use study_types::api::{
    MarkReadRequest, NotificationListResponse, NotificationResponse, UnreadCountResponse,
    UpdatedCountResponse, UserBrief,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::{CurrentUser, Pagination};
use crate::AppState;

fn notification_response(row: NotificationRow) -> NotificationResponse {
    let from_user = match (row.from_user_id, row.from_username) {
        (Some(id), Some(username)) => Some(UserBrief { id, username }),
        _ => None,
    };
    NotificationResponse {
        id: row.id,
        user_id: row.user_id,
        notification_type: row.notification_type,
        message: row.message,
        post_id: row.post_id,
        issue_id: row.issue_id,
        study_id: row.study_id,
        from_user_id: row.from_user_id,
        is_read: row.is_read,
        created_at: parse_datetime(&row.created_at),
        from_user,
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    user: CurrentUser,
) -> ApiResult<Json<NotificationListResponse>> {
    let pagination = Pagination {
        skip: query.skip,
        limit: query.limit,
    };
    let (skip, limit) = pagination.resolve(20)?;

    let total = state.db.count_notifications(user.id, query.unread_only)?;
    let unread_count = state.db.unread_notification_count(user.id)?;
    let items = state
        .db
        .list_notifications(user.id, skip, limit, query.unread_only)?
        .into_iter()
        .map(notification_response)
        .collect();

    Ok(Json(NotificationListResponse {
        total,
        unread_count,
        items,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<UnreadCountResponse>> {
    let unread_count = state.db.unread_notification_count(user.id)?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<MarkReadRequest>,
) -> ApiResult<Json<UpdatedCountResponse>> {
    let updated = state
        .db
        .mark_notifications_read(user.id, req.notification_ids.as_deref())?;
    Ok(Json(UpdatedCountResponse {
        updated_count: updated as i64,
    }))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    if !state.db.delete_notification(notification_id, user.id)? {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    state.db.delete_all_notifications(user.id)?;
    Ok(StatusCode::NO_CONTENT)
}
