use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use study_db::models::{parse_date, parse_datetime, IssueRow};
use study_types::api::{
    CreateIssueRequest, IssueDetailResponse, IssueListItem, IssueResponse, Paginated,
    UpdateIssueRequest, UserBrief,
};
use study_types::models::{CommentParent, NotificationType};
use study_types::IssueStatus;

use crate::authz::{require_member, require_owner};
use crate::comments::comment_details;
use crate::error::{ApiError, ApiResult};
use crate::extract::{CurrentUser, Pagination};
use crate::AppState;

/// Derive the status from the row's dates as of today. The persisted column
/// is ignored on reads; it is only a write-time cache.
fn derived_status(row: &IssueRow) -> IssueStatus {
    IssueStatus::derive(
        parse_date(row.start_date.as_deref()),
        parse_date(row.end_date.as_deref()),
        Utc::now().date_naive(),
    )
}

fn issue_response(row: &IssueRow) -> IssueResponse {
    IssueResponse {
        id: row.id,
        study_id: row.study_id,
        user_id: row.user_id,
        title: row.title.clone(),
        description: row.description.clone(),
        status: derived_status(row),
        start_date: parse_date(row.start_date.as_deref()),
        end_date: parse_date(row.end_date.as_deref()),
        created_at: parse_datetime(&row.created_at),
        updated_at: parse_datetime(&row.updated_at),
    }
}

fn load_issue(state: &AppState, issue_id: i64) -> ApiResult<IssueRow> {
    state
        .db
        .get_issue(issue_id)?
        .ok_or_else(|| ApiError::not_found("Issue not found"))
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

#[derive(Debug, Deserialize)]
pub struct IssueListQuery {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
    pub status_filter: Option<String>,
}

/// Member-gated board view. Status is derived per row before filtering, so
/// pagination and `total` apply to the filtered set.
pub async fn list_for_study(
    State(state): State<AppState>,
    Path(study_id): Path<i64>,
    Query(query): Query<IssueListQuery>,
    user: CurrentUser,
) -> ApiResult<Json<Paginated<IssueListItem>>> {
    if state.db.get_study(study_id)?.is_none() {
        return Err(ApiError::not_found("Study not found"));
    }
    require_member(&state.db, study_id, user.id, "issues")?;

    let pagination = Pagination {
        skip: query.skip,
        limit: query.limit,
    };
    let (skip, limit) = pagination.resolve(10)?;

    let status_filter = match query.status_filter.as_deref() {
        None => None,
        Some(raw) => Some(raw.parse::<IssueStatus>().map_err(|_| {
            ApiError::bad_request(
                "status_filter must be one of: Scheduled, In Progress, Closed",
            )
        })?),
    };

    let filtered: Vec<IssueListItem> = state
        .db
        .list_issues(study_id)?
        .into_iter()
        .filter_map(|row| {
            let status = derived_status(&row);
            if status_filter.is_some_and(|f| f != status) {
                return None;
            }
            Some(IssueListItem {
                id: row.id,
                study_id: row.study_id,
                title: row.title,
                status,
                start_date: parse_date(row.start_date.as_deref()),
                end_date: parse_date(row.end_date.as_deref()),
                author: UserBrief {
                    id: row.user_id,
                    username: row.author_username,
                },
                created_at: parse_datetime(&row.created_at),
            })
        })
        .collect();

    let total = filtered.len() as i64;
    let items = filtered
        .into_iter()
        .skip(skip as usize)
        .take(limit as usize)
        .collect();

    Ok(Json(Paginated { total, items }))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(issue_id): Path<i64>,
) -> ApiResult<Json<IssueDetailResponse>> {
    let issue = load_issue(&state, issue_id)?;
    let comments = comment_details(&state, CommentParent::Issue(issue_id))?;

    Ok(Json(IssueDetailResponse {
        issue: issue_response(&issue),
        author: UserBrief {
            id: issue.user_id,
            username: issue.author_username.clone(),
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
    Json(req): Json<CreateIssueRequest>,
) -> ApiResult<impl IntoResponse> {
    if state.db.get_study(params.study_id)?.is_none() {
        return Err(ApiError::not_found("Study not found"));
    }
    validate_title(&req.title)?;

    let status = IssueStatus::derive(req.start_date, req.end_date, Utc::now().date_naive());
    let start = req.start_date.map(|d| d.to_string());
    let end = req.end_date.map(|d| d.to_string());

    let issue_id = state.db.create_issue(
        params.study_id,
        user.id,
        &req.title,
        req.description.as_deref(),
        start.as_deref(),
        end.as_deref(),
        status,
    )?;

    state.db.notify_study_members(
        params.study_id,
        NotificationType::NewIssue,
        &format!("{} opened a new issue '{}'.", user.username, req.title),
        user.id,
        None,
        Some(issue_id),
        user.id,
    )?;

    let issue = load_issue(&state, issue_id)?;
    Ok((StatusCode::CREATED, Json(issue_response(&issue))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(issue_id): Path<i64>,
    user: CurrentUser,
    Json(req): Json<UpdateIssueRequest>,
) -> ApiResult<Json<IssueResponse>> {
    let issue = load_issue(&state, issue_id)?;
    require_owner(issue.user_id, user.id, "issue")?;

    let title = req.title.as_deref().unwrap_or(&issue.title);
    validate_title(title)?;
    let description = req
        .description
        .as_deref()
        .or(issue.description.as_deref());
    let start_date = req.start_date.or(parse_date(issue.start_date.as_deref()));
    let end_date = req.end_date.or(parse_date(issue.end_date.as_deref()));

    // Re-derive and re-persist the cached status alongside the new dates.
    let status = IssueStatus::derive(start_date, end_date, Utc::now().date_naive());
    let start = start_date.map(|d| d.to_string());
    let end = end_date.map(|d| d.to_string());

    state.db.update_issue(
        issue_id,
        title,
        description,
        start.as_deref(),
        end.as_deref(),
        status,
    )?;

    let updated = load_issue(&state, issue_id)?;
    Ok(Json(issue_response(&updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(issue_id): Path<i64>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let issue = load_issue(&state, issue_id)?;
    require_owner(issue.user_id, user.id, "issue")?;

    state.db.delete_issue(issue_id)?;
    Ok(StatusCode::NO_CONTENT)
}
