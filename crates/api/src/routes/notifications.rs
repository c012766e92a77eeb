//! Notification routes.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use notifier_common::error::AppError;
use notifier_common::types::{CreateNotification, Message, MessageStatus};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(create_notification))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/status", get(get_status))
        .route("/api/notifications/{id}", delete(delete_notification))
}

/// Request body for scheduling a notification.
#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub text: String,
    /// RFC3339 timestamp
    pub scheduled_at: String,
    pub user_id: u32,
    pub telegram_chat_id: u32,
}

impl TryFrom<CreateNotificationRequest> for CreateNotification {
    type Error = AppError;

    fn try_from(req: CreateNotificationRequest) -> Result<Self, Self::Error> {
        let scheduled_at = DateTime::parse_from_rfc3339(&req.scheduled_at)
            .map_err(|_| AppError::Validation("invalid scheduled_at, use RFC3339".to_string()))?
            .with_timezone(&Utc);

        Ok(Self {
            text: req.text,
            scheduled_at,
            user_id: req.user_id,
            telegram_chat_id: req.telegram_chat_id,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: MessageStatus,
}

fn message_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::Validation(format!("invalid message id: {}", e.body_text())))
}

/// POST /api/notifications: Schedule a notification for delayed delivery.
async fn create_notification(
    State(state): State<AppState>,
    body: Result<Json<CreateNotificationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let Json(req) =
        body.map_err(|e| AppError::Validation(format!("invalid JSON: {}", e.body_text())))?;
    let id = state.notifications.create(req.try_into()?).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// GET /api/notifications: List every notification, newest first.
async fn list_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = state.notifications.list().await?;
    Ok(Json(messages))
}

/// GET /api/notifications/:id/status: Current status of one notification.
async fn get_status(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = state.notifications.get_status(message_id(path)?).await?;
    Ok(Json(StatusResponse { status }))
}

/// DELETE /api/notifications/:id: Remove a notification.
async fn delete_notification(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    state.notifications.delete(message_id(path)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
