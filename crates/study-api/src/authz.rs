//! Ownership and membership predicates.
//!
//! Note the deliberate asymmetry: only the list-by-study endpoints for posts
//! and issues are membership-gated; study detail and post/issue detail by id
//! are readable without membership. Do not tighten or loosen this without
//! flagging it as a behavior change.

use study_db::models::StudyRow;
use study_db::Database;

use crate::error::{ApiError, ApiResult};

/// Gate read access to a study's posts/issues lists.
pub fn require_member(db: &Database, study_id: i64, user_id: i64, what: &str) -> ApiResult<()> {
    if db.is_member(study_id, user_id)? {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Only study members can view {what}"
        )))
    }
}

/// Mutating posts, comments and issues requires authorship.
pub fn require_owner(resource_user_id: i64, caller_id: i64, what: &str) -> ApiResult<()> {
    if resource_user_id == caller_id {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Not authorized to modify this {what}"
        )))
    }
}

/// Study mutation/deletion and member removal are restricted to the creator.
pub fn require_creator(study: &StudyRow, caller_id: i64, action: &str) -> ApiResult<()> {
    if study.creator_id == caller_id {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Only the study creator can {action}"
        )))
    }
}
