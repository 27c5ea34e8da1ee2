use crate::membership::{ClubStatus, MemberList};
use crate::schema::*;
use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};

/// Maps a unit enum onto a `Varchar` column, storing the given text.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(anyhow::anyhow!(
                        "unknown {} value: {other}",
                        stringify!($name)
                    )),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
                Ok(<String as FromSql<Text, Pg>>::from_sql(bytes)?.parse()?)
            }
        }
    };
}

pub(crate) use text_enum;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    ClubOwner,
    Admin,
}

text_enum!(Role {
    User => "user",
    ClubOwner => "club_owner",
    Admin => "admin",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Academic,
    Sports,
    Tech,
    Arts,
    Cultural,
    Political,
    Other,
}

text_enum!(Category {
    Academic => "academic",
    Sports => "sports",
    Tech => "tech",
    Arts => "arts",
    Cultural => "cultural",
    Political => "political",
    Other => "other",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    JoinRequest,
    JoinApproved,
    JoinDeclined,
    ClubApproval,
    ClubApproved,
    ClubRejected,
    ClubDeleted,
    NewPost,
    Other,
}

text_enum!(NotificationKind {
    JoinRequest => "JOIN_REQUEST",
    JoinApproved => "JOIN_APPROVED",
    JoinDeclined => "JOIN_DECLINED",
    ClubApproval => "CLUB_APPROVAL",
    ClubApproved => "CLUB_APPROVED",
    ClubRejected => "CLUB_REJECTED",
    ClubDeleted => "CLUB_DELETED",
    NewPost => "NEW_POST",
    Other => "OTHER",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Declined,
}

text_enum!(JoinRequestStatus {
    Pending => "pending",
    Approved => "approved",
    Declined => "declined",
});

/// Entity a notification points back at. Closed union instead of a
/// string-discriminated dynamic reference, so an unknown discriminator
/// cannot exist past the database boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedObject {
    Club(i32),
    Post(i32),
    User(i32),
    None,
}

impl RelatedObject {
    pub fn into_columns(self) -> (Option<&'static str>, Option<i32>) {
        match self {
            RelatedObject::Club(id) => (Some("Club"), Some(id)),
            RelatedObject::Post(id) => (Some("Post"), Some(id)),
            RelatedObject::User(id) => (Some("User"), Some(id)),
            RelatedObject::None => (None, None),
        }
    }

    pub fn from_columns(kind: Option<&str>, id: Option<i32>) -> anyhow::Result<RelatedObject> {
        match (kind, id) {
            (Some("Club"), Some(id)) => Ok(RelatedObject::Club(id)),
            (Some("Post"), Some(id)) => Ok(RelatedObject::Post(id)),
            (Some("User"), Some(id)) => Ok(RelatedObject::User(id)),
            (None, None) => Ok(RelatedObject::None),
            (kind, id) => Err(anyhow::anyhow!(
                "inconsistent related object reference: {kind:?}/{id:?}"
            )),
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct User {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub faculty: String,
    pub profile_picture_url: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub otp: Option<String>,
    pub otp_expiry: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Club {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub logo: Option<String>,
    pub banner: Option<String>,
    pub owner_id: i32,
    pub members: MemberList,
    pub status: ClubStatus,
    pub member_count: i32,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Club))]
#[diesel(belongs_to(User))]
pub struct JoinRequest {
    pub id: i32,
    pub club_id: i32,
    pub user_id: i32,
    pub status: JoinRequestStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Club))]
pub struct Post {
    pub id: i32,
    pub club_id: i32,
    pub author_id: i32,
    pub title: String,
    pub content: String,
    pub media_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Notification {
    pub id: i32,
    pub recipient_id: i32,
    pub kind: NotificationKind,
    pub message: String,
    pub related_type: Option<String>,
    pub related_id: Option<i32>,
    pub read: bool,
    pub created_at: NaiveDateTime,
}

impl Notification {
    pub fn related_object(&self) -> anyhow::Result<RelatedObject> {
        RelatedObject::from_columns(self.related_type.as_deref(), self.related_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in [Role::User, Role::ClubOwner, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn notification_kind_uses_wire_spelling() {
        assert_eq!(NotificationKind::JoinApproved.as_str(), "JOIN_APPROVED");
        assert_eq!(
            "CLUB_APPROVAL".parse::<NotificationKind>().unwrap(),
            NotificationKind::ClubApproval
        );
    }

    #[test]
    fn related_object_round_trips() {
        for related in [
            RelatedObject::Club(3),
            RelatedObject::Post(7),
            RelatedObject::User(12),
            RelatedObject::None,
        ] {
            let (kind, id) = related.into_columns();
            assert_eq!(RelatedObject::from_columns(kind, id).unwrap(), related);
        }
    }

    #[test]
    fn related_object_rejects_partial_reference() {
        assert!(RelatedObject::from_columns(Some("Club"), None).is_err());
        assert!(RelatedObject::from_columns(None, Some(4)).is_err());
        assert!(RelatedObject::from_columns(Some("Widget"), Some(4)).is_err());
    }
}
