//! Club roster and approval state machine.
//!
//! The member roster is embedded in the club row as JSONB, so every roster
//! change is a read-modify-write of one document. The pure operations on
//! [`MemberList`] enforce the roster invariants (no duplicate members, the
//! owner seeded at creation) and [`update_members`] makes the write-back
//! safe under concurrent approvals with a version-guarded compare-and-swap.

use crate::{
    error::{AppError, AppResult},
    models::{text_enum, Club},
    schema::clubs,
};
use chrono::{NaiveDateTime, Utc};
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::{Jsonb, Text};
use diesel::{AsExpression, FromSqlRow};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum ClubStatus {
    Pending,
    Active,
    Rejected,
}

text_enum!(ClubStatus {
    Pending => "pending",
    Active => "active",
    Rejected => "rejected",
});

impl ClubStatus {
    /// Admin approval. Only a pending club may become active.
    pub fn approve(self) -> Result<ClubStatus, AppError> {
        match self {
            ClubStatus::Pending => Ok(ClubStatus::Active),
            other => Err(AppError::conflict(format!(
                "club is not pending approval (status: {})",
                other.as_str()
            ))),
        }
    }

    /// Admin rejection deletes the club outright, so the only check is that
    /// the club is still awaiting review.
    pub fn rejectable(self) -> Result<(), AppError> {
        match self {
            ClubStatus::Pending => Ok(()),
            other => Err(AppError::conflict(format!(
                "club is not pending approval (status: {})",
                other.as_str()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Member,
    Moderator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user: i32,
    pub joined_at: NaiveDateTime,
    pub role: MemberRole,
}

/// Roster embedded in the club row. All mutation goes through methods that
/// keep the "at most one entry per user" invariant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Jsonb)]
#[serde(transparent)]
pub struct MemberList(Vec<Member>);

impl MemberList {
    /// Roster for a freshly created club: the owner is a member from the
    /// start.
    pub fn founding(owner_id: i32, now: NaiveDateTime) -> MemberList {
        MemberList(vec![Member {
            user: owner_id,
            joined_at: now,
            role: MemberRole::Member,
        }])
    }

    pub fn contains(&self, user_id: i32) -> bool {
        self.0.iter().any(|m| m.user == user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.0.iter()
    }

    pub fn user_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().map(|m| m.user)
    }

    pub fn add(&mut self, user_id: i32, now: NaiveDateTime) -> AppResult<()> {
        if self.contains(user_id) {
            return Err(AppError::conflict("user is already a member of this club"));
        }
        self.0.push(Member {
            user: user_id,
            joined_at: now,
            role: MemberRole::Member,
        });
        Ok(())
    }

    pub fn remove(&mut self, user_id: i32) -> AppResult<()> {
        let index = self
            .0
            .iter()
            .position(|m| m.user == user_id)
            .ok_or_else(|| AppError::conflict("you are not a member of this club"))?;
        self.0.remove(index);
        Ok(())
    }
}

impl FromSql<Jsonb, Pg> for MemberList {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        let value = <serde_json::Value as FromSql<Jsonb, Pg>>::from_sql(bytes)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl ToSql<Jsonb, Pg> for MemberList {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let value = serde_json::to_value(self)?;
        <serde_json::Value as ToSql<Jsonb, Pg>>::to_sql(&value, &mut out.reborrow())
    }
}

/// Applies a roster mutation to the club and writes it back together with
/// the recomputed member count. The update is guarded by the row version;
/// losing the race to a concurrent writer reloads and reapplies, so two
/// simultaneous approvals of the same user cannot both append an edge.
pub async fn update_members<F>(
    conn: &mut AsyncPgConnection,
    club_id: i32,
    mut apply: F,
) -> AppResult<Club>
where
    F: FnMut(&Club, &mut MemberList) -> AppResult<()>,
{
    loop {
        let club = clubs::table
            .find(club_id)
            .first::<Club>(conn)
            .await
            .optional()?
            .ok_or_else(|| AppError::not_found("club not found"))?;

        let mut members = club.members.clone();
        apply(&club, &mut members)?;

        let updated = diesel::update(
            clubs::table
                .find(club_id)
                .filter(clubs::version.eq(club.version)),
        )
        .set((
            clubs::members.eq(&members),
            clubs::member_count.eq(members.len() as i32),
            clubs::version.eq(club.version + 1),
            clubs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result::<Club>(conn)
        .await
        .optional()?;

        match updated {
            Some(club) => return Ok(club),
            // lost the compare-and-swap, retry on fresh state
            None => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    fn conflict_status(err: AppError) -> StatusCode {
        match err {
            AppError::ResponseStatusError(code, _) => code,
            AppError::InternalServerError(e) => panic!("unexpected internal error: {e}"),
        }
    }

    #[test]
    fn founding_roster_holds_the_owner() {
        let members = MemberList::founding(7, now());
        assert!(members.contains(7));
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn add_rejects_duplicate_member() {
        let mut members = MemberList::founding(1, now());
        members.add(2, now()).unwrap();
        let err = members.add(2, now()).unwrap_err();
        assert_eq!(conflict_status(err), StatusCode::CONFLICT);
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn remove_drops_exactly_one_entry() {
        let mut members = MemberList::founding(1, now());
        members.add(2, now()).unwrap();
        members.add(3, now()).unwrap();
        members.remove(2).unwrap();
        assert!(!members.contains(2));
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn remove_of_non_member_is_a_conflict() {
        let mut members = MemberList::founding(1, now());
        let err = members.remove(9).unwrap_err();
        assert_eq!(conflict_status(err), StatusCode::CONFLICT);
    }

    #[test]
    fn repeated_approvals_keep_the_roster_unique() {
        // the same (club, user) approval applied twice against the roster
        // must only ever append one edge
        let mut members = MemberList::founding(1, now());
        assert!(members.add(5, now()).is_ok());
        assert!(members.add(5, now()).is_err());
        assert_eq!(members.user_ids().filter(|id| *id == 5).count(), 1);
    }

    #[test]
    fn status_transitions_are_closed() {
        assert_eq!(ClubStatus::Pending.approve().unwrap(), ClubStatus::Active);
        assert!(ClubStatus::Active.approve().is_err());
        assert!(ClubStatus::Rejected.approve().is_err());
        assert!(ClubStatus::Pending.rejectable().is_ok());
        assert!(ClubStatus::Active.rejectable().is_err());
    }

    #[test]
    fn roster_serializes_with_camel_case_keys() {
        let members = MemberList::founding(4, now());
        let json = serde_json::to_value(&members).unwrap();
        let entry = &json.as_array().unwrap()[0];
        assert_eq!(entry["user"], 4);
        assert_eq!(entry["role"], "member");
        assert!(entry.get("joinedAt").is_some());
    }
}
