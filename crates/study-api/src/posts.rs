use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use study_db::models::{parse_datetime, PostRow};
use study_types::api::{
    CreatePostRequest, Paginated, PostDetailResponse, PostListItem, PostResponse,
    UpdatePostRequest, UserBrief,
};
use study_types::models::{CommentParent, NotificationType};

use crate::authz::{require_member, require_owner};
use crate::comments::comment_details;
use crate::error::{ApiError, ApiResult};
use crate::extract::{CurrentUser, Pagination};
use crate::AppState;

fn post_response(row: &PostRow) -> PostResponse {
    PostResponse {
        id: row.id,
        study_id: row.study_id,
        user_id: row.user_id,
        title: row.title.clone(),
        content: row.content.clone(),
        created_at: parse_datetime(&row.created_at),
        updated_at: parse_datetime(&row.updated_at),
    }
}

fn load_post(state: &AppState, post_id: i64) -> ApiResult<PostRow> {
    state
        .db
        .get_post(post_id)?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

fn validate_title(title: &str) -> ApiResult<()> {
    if (1..=255).contains(&title.chars().count()) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "Title must be between 1 and 255 characters",
        ))
    }
}

fn validate_content(content: &str) -> ApiResult<()> {
    if content.is_empty() {
        Err(ApiError::bad_request("Content must not be empty"))
    } else {
        Ok(())
    }
}

/// Member-gated, unlike the detail-by-id endpoint below.
pub async fn list_for_study(
    State(state): State<AppState>,
    Path(study_id): Path<i64>,
    Query(pagination): Query<Pagination>,
    user: CurrentUser,
) -> ApiResult<Json<Paginated<PostListItem>>> {
    if state.db.get_study(study_id)?.is_none() {
        return Err(ApiError::not_found("Study not found"));
    }
    require_member(&state.db, study_id, user.id, "posts")?;

    let (skip, limit) = pagination.resolve(10)?;
    let total = state.db.count_posts(study_id)?;
    let items = state
        .db
        .list_posts(study_id, skip, limit)?
        .into_iter()
        .map(|row| PostListItem {
            id: row.id,
            study_id: row.study_id,
            title: row.title,
            author: UserBrief {
                id: row.user_id,
                username: row.author_username,
            },
            comment_count: row.comment_count,
            created_at: parse_datetime(&row.created_at),
        })
        .collect();

    Ok(Json(Paginated { total, items }))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<PostDetailResponse>> {
    let post = load_post(&state, post_id)?;
    let comments = comment_details(&state, CommentParent::Post(post_id))?;

    Ok(Json(PostDetailResponse {
        post: post_response(&post),
        author: UserBrief {
            id: post.user_id,
            username: post.author_username.clone(),
        },
        comment_count: comments.len() as i64,
        comments,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StudyIdParam {
    pub study_id: i64,
}

pub async fn create(
    State(state): State<AppState>,
    Query(params): Query<StudyIdParam>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    if state.db.get_study(params.study_id)?.is_none() {
        return Err(ApiError::not_found("Study not found"));
    }
    validate_title(&req.title)?;
    validate_content(&req.content)?;

    let post_id = state
        .db
        .create_post(params.study_id, user.id, &req.title, &req.content)?;

    state.db.notify_study_members(
        params.study_id,
        NotificationType::NewPost,
        &format!("{} published a new post '{}'.", user.username, req.title),
        user.id,
        Some(post_id),
        None,
        user.id,
    )?;

    let post = load_post(&state, post_id)?;
    Ok((StatusCode::CREATED, Json(post_response(&post))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    user: CurrentUser,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let post = load_post(&state, post_id)?;
    require_owner(post.user_id, user.id, "post")?;

    let title = req.title.as_deref().unwrap_or(&post.title);
    let content = req.content.as_deref().unwrap_or(&post.content);
    validate_title(title)?;
    validate_content(content)?;

    state.db.update_post(post_id, title, content)?;

    let updated = load_post(&state, post_id)?;
    Ok(Json(post_response(&updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let post = load_post(&state, post_id)?;
    require_owner(post.user_id, user.id, "post")?;

    state.db.delete_post(post_id)?;
    Ok(StatusCode::NO_CONTENT)
}
