//! Run-once-if-absent startup seeding.

use crate::{auth, error::AppResult, models::Role, schema::users, DbPool};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use std::env::var;

lazy_static::lazy_static! {
    /// The distinguished administrator account. `delete_user` refuses to
    /// remove it.
    pub static ref ROOT_ADMIN_EMAIL: String =
        var("ROOT_ADMIN_EMAIL").expect("ROOT_ADMIN_EMAIL must be set");
    static ref ROOT_ADMIN_PASSWORD: String =
        var("ROOT_ADMIN_PASSWORD").expect("ROOT_ADMIN_PASSWORD must be set");
}

/// Seeds the root admin account if it does not exist yet. Safe to run on
/// every boot.
pub async fn seed_root_admin(pool: &DbPool) -> AppResult<()> {
    #[derive(Insertable)]
    #[diesel(table_name = users)]
    struct NewAdmin<'a> {
        first_name: &'a str,
        last_name: &'a str,
        email: &'a str,
        phone: &'a str,
        password_hash: String,
        role: Role,
        faculty: &'a str,
        is_verified: bool,
        is_active: bool,
    }

    let conn = &mut pool.get().await?;

    let existing: i64 = users::table
        .filter(users::email.eq(ROOT_ADMIN_EMAIL.as_str()))
        .count()
        .get_result(conn)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    diesel::insert_into(users::table)
        .values(NewAdmin {
            first_name: "Campus",
            last_name: "Admin",
            email: ROOT_ADMIN_EMAIL.as_str(),
            phone: "+000000000000",
            password_hash: auth::hash_password(ROOT_ADMIN_PASSWORD.as_str())?,
            role: Role::Admin,
            faculty: "Administration",
            is_verified: true,
            is_active: true,
        })
        .on_conflict(users::email)
        .do_nothing()
        .execute(conn)
        .await?;

    tracing::info!(email = %*ROOT_ADMIN_EMAIL, "seeded root admin account");
    Ok(())
}
