use super::{PageInfo, Pagination};
use crate::{
    auth::ExtractAuth,
    error::{AppError, AppResult},
    models::{Notification, NotificationKind, Role},
    schema::notifications,
    DbPool,
};
use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: i32,
    pub recipient_id: i32,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub related_object_type: Option<String>,
    pub related_object_id: Option<i32>,
    pub read: bool,
    pub created_at: NaiveDateTime,
}

impl NotificationResponse {
    pub fn from_notification(notification: Notification) -> NotificationResponse {
        NotificationResponse {
            id: notification.id,
            recipient_id: notification.recipient_id,
            kind: notification.kind,
            message: notification.message,
            related_object_type: notification.related_type,
            related_object_id: notification.related_id,
            read: notification.read,
            created_at: notification.created_at,
        }
    }
}

#[derive(Deserialize)]
struct ListQuery {
    read: Option<bool>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    notifications: Vec<NotificationResponse>,
    pagination: PageInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageResponse {
    message: String,
}

async fn list(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ListResponse>> {
    let conn = &mut pool.get().await?;
    let pagination = Pagination::from_params(query.page, query.limit);

    let filtered = || {
        let mut q = notifications::table
            .filter(notifications::recipient_id.eq(user.id))
            .into_boxed();
        if let Some(read) = query.read {
            q = q.filter(notifications::read.eq(read));
        }
        q
    };

    let total: i64 = filtered().count().get_result(conn).await?;
    let page = filtered()
        .order(notifications::created_at.desc())
        .offset(pagination.offset())
        .limit(pagination.limit)
        .load::<Notification>(conn)
        .await?;

    Ok(Json(ListResponse {
        notifications: page
            .into_iter()
            .map(NotificationResponse::from_notification)
            .collect(),
        pagination: PageInfo::new(pagination, total),
    }))
}

async fn mark_read(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path(notification_id): Path<i32>,
) -> AppResult<Json<NotificationResponse>> {
    let conn = &mut pool.get().await?;

    let notification = notifications::table
        .find(notification_id)
        .first::<Notification>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("notification not found"))?;

    // admins may mark any notification read, everyone else only their own
    if notification.recipient_id != user.id && user.role != Role::Admin {
        return Err(AppError::forbidden(
            "this notification does not belong to you",
        ));
    }

    let updated = diesel::update(notifications::table.find(notification.id))
        .set(notifications::read.eq(true))
        .get_result::<Notification>(conn)
        .await?;

    Ok(Json(NotificationResponse::from_notification(updated)))
}

async fn mark_all_read(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;

    diesel::update(
        notifications::table
            .filter(notifications::recipient_id.eq(user.id))
            .filter(notifications::read.eq(false)),
    )
    .set(notifications::read.eq(true))
    .execute(conn)
    .await?;

    Ok(Json(MessageResponse {
        message: "All notifications marked as read".to_string(),
    }))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/:notification_id/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
}
