pub mod dto;
pub mod session;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path};
use axum::routing::{post, put};
use axum::{Router, extract::State, routing::get};
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};
use tracing::info;

use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

use dto::{AvatarResponse, MessageResponse, TodoResponse, TodosResponse, UserResponse};
use session::CurrentUser;

const AVATAR_FIELD: &str = "avatar";

/// Builds the HTTP surface. Sessions live in `sessions`, whichever store the
/// caller chooses.
pub fn router<Store>(state: AppState, sessions: Store) -> Router
where
    Store: SessionStore + Clone,
{
    let session_layer = SessionManagerLayer::new(sessions)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(7)));

    let upload_limit = DefaultBodyLimit::max(state.max_avatar_bytes);

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(current_user))
        .route("/upload-avatar", post(upload_avatar).layer(upload_limit))
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{id}", put(update_todo).delete(delete_todo))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn register(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(req) = payload?;
    let user = state
        .users
        .register(&req.username, &req.email, &req.password)
        .await?;
    session::sign_in(&session, &user.username).await?;
    Ok(Json(MessageResponse::ok("Registration successful")))
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(req) = payload?;
    let user = state.users.authenticate(&req.username, &req.password).await?;
    session::sign_in(&session, &user.username).await?;
    info!("user {} logged in", user.username);
    Ok(Json(MessageResponse::ok("Login successful")))
}

async fn logout(session: Session) -> Result<Json<MessageResponse>, AppError> {
    session::sign_out(&session).await?;
    Ok(Json(MessageResponse::ok("Logged out")))
}

async fn current_user(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.public_profile(&username).await?;
    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<AvatarResponse>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }

        let original_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await?;
        let filename = state
            .avatars
            .store(&username, original_name.as_deref(), &bytes)
            .await?;

        if let Some(previous) = state.users.set_avatar(&username, &filename).await? {
            if previous != filename {
                state.avatars.remove(&previous).await;
            }
        }

        return Ok(Json(AvatarResponse {
            success: true,
            message: "Avatar uploaded successfully".to_string(),
            filename,
        }));
    }

    Err(AppError::InvalidInput("No file uploaded".to_string()))
}

async fn list_todos(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
) -> Result<Json<TodosResponse>, AppError> {
    let todos = state.todos.list(&username).await?;
    Ok(Json(TodosResponse {
        success: true,
        todos,
    }))
}

async fn create_todo(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
    payload: Result<Json<NewTodoRequest>, JsonRejection>,
) -> Result<Json<TodoResponse>, AppError> {
    let Json(req) = payload?;
    let todo = state.todos.add(&username, &req.text).await?;
    Ok(Json(TodoResponse {
        success: true,
        todo,
    }))
}

async fn update_todo(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<TodoResponse>, AppError> {
    let Json(req) = payload?;
    let todo = state.todos.update(&username, &id, req).await?;
    Ok(Json(TodoResponse {
        success: true,
        todo,
    }))
}

async fn delete_todo(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.todos.delete(&username, &id).await?;
    Ok(Json(MessageResponse::ok("Todo deleted")))
}
