use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use study_db::models::{parse_datetime, MemberRow, StudyRow};
use study_types::api::{
    AddMemberRequest, CreateStudyRequest, MemberResponse, Paginated, StudyDetailResponse,
    StudyListItem, StudyResponse, UpdateStudyRequest, UserBrief,
};
use study_types::models::MemberRole;

use crate::authz::require_creator;
use crate::error::{ApiError, ApiResult};
use crate::extract::{CurrentUser, Pagination};
use crate::AppState;

fn study_response(row: &StudyRow) -> StudyResponse {
    StudyResponse {
        id: row.id,
        name: row.name.clone(),
        description: row.description.clone(),
        creator_id: row.creator_id,
        created_at: parse_datetime(&row.created_at),
        updated_at: parse_datetime(&row.updated_at),
    }
}

fn member_response(row: &MemberRow) -> MemberResponse {
    MemberResponse {
        id: row.id,
        study_id: row.study_id,
        user_id: row.user_id,
        username: row.username.clone(),
        role: row.role.clone(),
        joined_at: parse_datetime(&row.joined_at),
    }
}

fn load_study(state: &AppState, study_id: i64) -> ApiResult<StudyRow> {
    state
        .db
        .get_study(study_id)?
        .ok_or_else(|| ApiError::not_found("Study not found"))
}

fn validate_name(name: &str) -> ApiResult<()> {
    if (1..=255).contains(&name.chars().count()) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "Study name must be between 1 and 255 characters",
        ))
    }
}

fn validate_description(description: Option<&str>) -> ApiResult<()> {
    match description {
        Some(d) if d.chars().count() > 1000 => Err(ApiError::bad_request(
            "Description must be at most 1000 characters",
        )),
        _ => Ok(()),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Paginated<StudyListItem>>> {
    let (skip, limit) = pagination.resolve(10)?;

    let total = state.db.count_studies()?;
    let items = state
        .db
        .list_studies(skip, limit)?
        .iter()
        .map(|(row, member_count)| StudyListItem {
            study: study_response(row),
            member_count: *member_count,
        })
        .collect();

    Ok(Json(Paginated { total, items }))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(study_id): Path<i64>,
) -> ApiResult<Json<StudyDetailResponse>> {
    let study = load_study(&state, study_id)?;

    let creator = state
        .db
        .get_user_by_id(study.creator_id)?
        .map(|u| UserBrief {
            id: u.id,
            username: u.username,
        })
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("study creator vanished")))?;

    let members = state
        .db
        .list_all_members(study_id)?
        .iter()
        .map(member_response)
        .collect();

    Ok(Json(StudyDetailResponse {
        study: study_response(&study),
        creator,
        members,
    }))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateStudyRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_name(&req.name)?;
    validate_description(req.description.as_deref())?;

    if state.db.get_study_by_name(&req.name)?.is_some() {
        return Err(ApiError::bad_request(
            "A study with this name already exists",
        ));
    }

    let study_id = state
        .db
        .create_study(&req.name, req.description.as_deref(), user.id)
        .map_err(|e| ApiError::from_db(e, "A study with this name already exists"))?;

    let study = load_study(&state, study_id)?;
    Ok((StatusCode::CREATED, Json(study_response(&study))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(study_id): Path<i64>,
    user: CurrentUser,
    Json(req): Json<UpdateStudyRequest>,
) -> ApiResult<Json<StudyResponse>> {
    let study = load_study(&state, study_id)?;
    require_creator(&study, user.id, "update this study")?;

    let name = req.name.as_deref().unwrap_or(&study.name);
    let description = req
        .description
        .as_deref()
        .or(study.description.as_deref());

    validate_name(name)?;
    validate_description(description)?;

    state
        .db
        .update_study(study_id, name, description)
        .map_err(|e| ApiError::from_db(e, "A study with this name already exists"))?;

    let updated = load_study(&state, study_id)?;
    Ok(Json(study_response(&updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(study_id): Path<i64>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let study = load_study(&state, study_id)?;
    require_creator(&study, user.id, "delete this study")?;

    state.db.delete_study(study_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(study_id): Path<i64>,
    _user: CurrentUser,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<impl IntoResponse> {
    load_study(&state, study_id)?;

    let user_to_add = state
        .db
        .get_user_by_email(&req.email)?
        .ok_or_else(|| ApiError::not_found("User not found with this email"))?;

    if state.db.is_member(study_id, user_to_add.id)? {
        return Err(ApiError::bad_request(
            "User is already a member of this study",
        ));
    }

    // A concurrent add racing past the check above loses on the unique
    // constraint and is reported the same way.
    state
        .db
        .add_member(study_id, user_to_add.id, MemberRole::Member)
        .map_err(|e| ApiError::from_db(e, "User is already a member of this study"))?;

    let member = state
        .db
        .get_member(study_id, user_to_add.id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("added member vanished")))?;

    Ok((StatusCode::CREATED, Json(member_response(&member))))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(study_id): Path<i64>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Paginated<MemberResponse>>> {
    load_study(&state, study_id)?;
    let (skip, limit) = pagination.resolve(10)?;

    let total = state.db.count_members(study_id)?;
    let items = state
        .db
        .list_members(study_id, skip, limit)?
        .iter()
        .map(member_response)
        .collect();

    Ok(Json(Paginated { total, items }))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((study_id, user_id)): Path<(i64, i64)>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let study = load_study(&state, study_id)?;
    require_creator(&study, user.id, "remove members")?;

    if user_id == user.id {
        return Err(ApiError::bad_request(
            "Cannot remove yourself from the study",
        ));
    }

    if !state.db.remove_member(study_id, user_id)? {
        return Err(ApiError::not_found("Member not found in this study"));
    }

    Ok(StatusCode::NO_CONTENT)
}
