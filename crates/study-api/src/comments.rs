use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use study_db::models::{parse_datetime, CommentRow, NewNotification};
use study_types::api::{
    CommentDetail, CommentResponse, CreateCommentRequest, UpdateCommentRequest, UserBrief,
};
use study_types::models::{CommentParent, NotificationType};

use crate::authz::require_owner;
use crate::error::{ApiError, ApiResult};
use crate::extract::CurrentUser;
use crate::AppState;

fn comment_response(row: &CommentRow) -> CommentResponse {
    CommentResponse {
        id: row.id,
        post_id: row.post_id,
        issue_id: row.issue_id,
        user_id: row.user_id,
        content: row.content.clone(),
        created_at: parse_datetime(&row.created_at),
        updated_at: parse_datetime(&row.updated_at),
    }
}

/// Comments of one post or issue with their authors, for the detail views.
pub(crate) fn comment_details(
    state: &AppState,
    parent: CommentParent,
) -> ApiResult<Vec<CommentDetail>> {
    let details = state
        .db
        .list_comments(parent)?
        .iter()
        .map(|row| CommentDetail {
            comment: comment_response(row),
            author: UserBrief {
                id: row.user_id,
                username: row.author_username.clone(),
            },
        })
        .collect();
    Ok(details)
}

fn validate_content(content: &str) -> ApiResult<()> {
    if (1..=5000).contains(&content.chars().count()) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "Comment must be between 1 and 5000 characters",
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ParentParams {
    pub post_id: Option<i64>,
    pub issue_id: Option<i64>,
}

pub async fn create(
    State(state): State<AppState>,
    Query(params): Query<ParentParams>,
    user: CurrentUser,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let parent = CommentParent::from_columns(params.post_id, params.issue_id)
        .ok_or_else(|| ApiError::bad_request("Provide exactly one of post_id or issue_id"))?;
    validate_content(&req.content)?;

    match parent {
        CommentParent::Post(post_id) => {
            let post = state
                .db
                .get_post(post_id)?
                .ok_or_else(|| ApiError::not_found("Post not found"))?;

            let comment_id = state.db.create_comment(parent, user.id, &req.content)?;

            // Notify the post's author; suppressed when they comment on
            // their own post.
            state.db.create_notification(NewNotification {
                user_id: post.user_id,
                notification_type: NotificationType::PostComment,
                message: &format!(
                    "{} commented on your post '{}'.",
                    user.username, post.title
                ),
                post_id: Some(post_id),
                issue_id: None,
                study_id: Some(post.study_id),
                from_user_id: Some(user.id),
            })?;

            finish_create(&state, comment_id)
        }
        CommentParent::Issue(issue_id) => {
            let issue = state
                .db
                .get_issue(issue_id)?
                .ok_or_else(|| ApiError::not_found("Issue not found"))?;

            let comment_id = state.db.create_comment(parent, user.id, &req.content)?;

            state.db.create_notification(NewNotification {
                user_id: issue.user_id,
                notification_type: NotificationType::IssueComment,
                message: &format!(
                    "{} commented on your issue '{}'.",
                    user.username, issue.title
                ),
                post_id: None,
                issue_id: Some(issue_id),
                study_id: Some(issue.study_id),
                from_user_id: Some(user.id),
            })?;

            finish_create(&state, comment_id)
        }
    }
}

fn finish_create(state: &AppState, comment_id: i64) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let comment = state
        .db
        .get_comment(comment_id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("created comment vanished")))?;
    Ok((StatusCode::CREATED, Json(comment_response(&comment))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    user: CurrentUser,
    Json(req): Json<UpdateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = state
        .db
        .get_comment(comment_id)?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    require_owner(comment.user_id, user.id, "comment")?;
    validate_content(&req.content)?;

    state.db.update_comment(comment_id, &req.content)?;

    let updated = state
        .db
        .get_comment(comment_id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("updated comment vanished")))?;
    Ok(Json(comment_response(&updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let comment = state
        .db
        .get_comment(comment_id)?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    require_owner(comment.user_id, user.id, "comment")?;

    state.db.delete_comment(comment_id)?;
    Ok(StatusCode::NO_CONTENT)
}
