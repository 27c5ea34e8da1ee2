//! Notification fan-out.
//!
//! Creates notification records addressed to a single recipient. The
//! rendered message is captured at creation time and never re-derived, so
//! it stays meaningful even after the referenced entity is deleted (the
//! rejected-club flow depends on this).

use crate::{
    error::{AppError, AppResult},
    models::{Notification, NotificationKind, RelatedObject},
    schema::{notifications, users},
};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

#[derive(Insertable)]
#[diesel(table_name = notifications)]
struct NewNotification<'a> {
    recipient_id: i32,
    kind: NotificationKind,
    message: &'a str,
    related_type: Option<&'static str>,
    related_id: Option<i32>,
}

/// Persists one notification. Fails with a not-found error when the
/// recipient does not exist; whether that is fatal is the caller's call.
pub async fn notify(
    conn: &mut AsyncPgConnection,
    recipient_id: i32,
    kind: NotificationKind,
    message: &str,
    related: RelatedObject,
) -> AppResult<Notification> {
    let recipient_exists: i64 = users::table
        .filter(users::id.eq(recipient_id))
        .count()
        .get_result(conn)
        .await?;
    if recipient_exists == 0 {
        return Err(AppError::not_found("notification recipient does not exist"));
    }

    let (related_type, related_id) = related.into_columns();
    let notification = diesel::insert_into(notifications::table)
        .values(NewNotification {
            recipient_id,
            kind,
            message,
            related_type,
            related_id,
        })
        .get_result::<Notification>(conn)
        .await?;

    Ok(notification)
}

/// Fan-out variant: a failure to notify one recipient must not roll back
/// the primary operation or block notifying the rest.
pub async fn notify_best_effort(
    conn: &mut AsyncPgConnection,
    recipient_id: i32,
    kind: NotificationKind,
    message: &str,
    related: RelatedObject,
) {
    if let Err(e) = notify(conn, recipient_id, kind, message, related).await {
        match e {
            AppError::ResponseStatusError(code, msg) => {
                tracing::warn!(recipient_id, %code, %msg, "skipping notification");
            }
            AppError::InternalServerError(err) => {
                tracing::warn!(recipient_id, error = ?err, "skipping notification");
            }
        }
    }
}
