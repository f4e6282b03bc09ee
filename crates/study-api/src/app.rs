use axum::extract::State;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};

use crate::error::ApiResult;
use crate::{auth, comments, issues, notifications, posts, studies, AppState};

/// Assemble the full application router. Layers (CORS, tracing) are added by
/// the server binary; tests drive this router directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", api_routes())
        .route("/api/db-status", get(db_status))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me).put(auth::update_profile))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/studies", get(studies::list).post(studies::create))
        .route(
            "/studies/{study_id}",
            get(studies::detail)
                .put(studies::update)
                .delete(studies::delete),
        )
        .route(
            "/studies/{study_id}/members",
            get(studies::list_members).post(studies::add_member),
        )
        .route(
            "/studies/{study_id}/members/{user_id}",
            delete(studies::remove_member),
        )
        .route("/posts/study/{study_id}", get(posts::list_for_study))
        .route("/posts", post(posts::create))
        .route(
            "/posts/{post_id}",
            get(posts::detail).put(posts::update).delete(posts::delete),
        )
        .route("/issues/study/{study_id}", get(issues::list_for_study))
        .route("/issues", post(issues::create))
        .route(
            "/issues/{issue_id}",
            get(issues::detail)
                .put(issues::update)
                .delete(issues::delete),
        )
        .route("/comments", post(comments::create))
        .route(
            "/comments/{comment_id}",
            put(comments::update).delete(comments::delete),
        )
        .route(
            "/notifications",
            get(notifications::list).delete(notifications::delete_all),
        )
        .route(
            "/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route("/notifications/read", put(notifications::mark_read))
        .route(
            "/notifications/{notification_id}",
            delete(notifications::delete_one),
        )
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Study Together API Server" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn db_status(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.db.with_conn(|conn| {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    })?;
    Ok(Json(serde_json::json!({ "database": "connected" })))
}
