#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role attached to every authenticated caller by the identity provider.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform administrator. Reviews courses and may manage any course's content, but
    /// allocation stays with the owning instructor.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "admin"))]
    Admin,
    /// Owns courses, allocates them to students and authors quizzes.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "instructor"))]
    Instructor,
    /// Consumes allocated courses.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "student"))]
    Student,
}

impl Role {
    pub const ALL: &'static [Role] = &[Self::Admin, Self::Instructor, Self::Student];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Instructor => "instructor",
            Self::Student => "student",
        }
    }

    /// Permissions granted to the role.
    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            Self::Admin => &["course:create", "course:review", "course:delete", "quiz:manage"],
            Self::Instructor => &[
                "course:create",
                "course:delete",
                "course:allocate",
                "quiz:manage",
            ],
            Self::Student => &["course:enroll", "course:progress", "quiz:submit"],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid role string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role '{0}'. Valid values: admin, instructor, student")]
pub struct ParseRoleError(String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "instructor" => Ok(Self::Instructor),
            "student" => Ok(Self::Student),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}
