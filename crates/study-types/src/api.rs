use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::IssueStatus;

// -- Shared --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub total: i64,
    pub items: Vec<T>,
}

/// Minimal author projection embedded in posts, issues and comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBrief {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleMessage {
    pub message: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForgotPasswordResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

// -- Studies --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateStudyRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStudyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudyListItem {
    #[serde(flatten)]
    pub study: StudyResponse,
    pub member_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudyDetailResponse {
    #[serde(flatten)]
    pub study: StudyResponse,
    pub creator: UserBrief,
    pub members: Vec<MemberResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberResponse {
    pub id: i64,
    pub study_id: i64,
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub study_id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostListItem {
    pub id: i64,
    pub study_id: i64,
    pub title: String,
    pub author: UserBrief,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    pub author: UserBrief,
    pub comments: Vec<CommentDetail>,
    pub comment_count: i64,
}

// -- Issues --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateIssueRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResponse {
    pub id: i64,
    pub study_id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: IssueStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueListItem {
    pub id: i64,
    pub study_id: i64,
    pub title: String,
    pub status: IssueStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub author: UserBrief,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueDetailResponse {
    #[serde(flatten)]
    pub issue: IssueResponse,
    pub author: UserBrief,
    pub comments: Vec<CommentDetail>,
    pub comment_count: i64,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: Option<i64>,
    pub issue_id: Option<i64>,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDetail {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub author: UserBrief,
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub user_id: i64,
    pub notification_type: String,
    pub message: String,
    pub post_id: Option<i64>,
    pub issue_id: Option<i64>,
    pub study_id: Option<i64>,
    pub from_user_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub from_user: Option<UserBrief>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationListResponse {
    pub total: i64,
    pub unread_count: i64,
    pub items: Vec<NotificationResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    /// `None` marks every unread notification as read.
    pub notification_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedCountResponse {
    pub updated_count: i64,
}
