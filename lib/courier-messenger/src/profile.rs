//! Role-dependent profile data and the display projection shown next to
//! conversations.

use serde::{Deserialize, Serialize};

pub const UNKNOWN_NAME: &str = "Unknown";
pub const ADMIN_NAME: &str = "Admin";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Athlete,
    Club,
    Brand,
    Individual,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Athlete => "ATHLETE",
            Role::Club => "CLUB",
            Role::Brand => "BRAND",
            Role::Individual => "INDIVIDUAL",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ATHLETE" => Ok(Role::Athlete),
            "CLUB" => Ok(Role::Club),
            "BRAND" => Ok(Role::Brand),
            "INDIVIDUAL" => Ok(Role::Individual),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_owned())),
        }
    }
}

/// Sub-profile of a person account (athletes, individuals).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonInfo {
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
}

/// Sub-profile of an organization account (clubs, brands).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationInfo {
    pub name: Option<String>,
    pub logo_image: Option<String>,
}

/// Profile data by account kind. A sub-profile that was never filled in is
/// represented by its `Default`.
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    Athlete(PersonInfo),
    Club(OrganizationInfo),
    Brand(OrganizationInfo),
    Individual(PersonInfo),
    Admin,
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Athlete(_) => Role::Athlete,
            Profile::Club(_) => Role::Club,
            Profile::Brand(_) => Role::Brand,
            Profile::Individual(_) => Role::Individual,
            Profile::Admin => Role::Admin,
        }
    }
}

/// Platform-wide admin profile; only its image is shown to users.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminProfile {
    pub admin_image: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DisplayProjection {
    pub name: String,
    pub image: Option<String>,
}

impl DisplayProjection {
    pub fn unknown() -> Self {
        DisplayProjection { name: UNKNOWN_NAME.to_owned(), image: None }
    }
}

pub fn display_projection(profile: &Profile, admin: Option<&AdminProfile>) -> DisplayProjection {
    let (name, image) = match profile {
        Profile::Athlete(person) | Profile::Individual(person) => {
            (person.full_name.clone(), person.profile_image.clone())
        }
        Profile::Club(organization) | Profile::Brand(organization) => {
            (organization.name.clone(), organization.logo_image.clone())
        }
        Profile::Admin => (
            Some(ADMIN_NAME.to_owned()),
            admin.and_then(|admin| admin.admin_image.clone()),
        ),
    };

    DisplayProjection {
        name: non_empty(name).unwrap_or_else(|| UNKNOWN_NAME.to_owned()),
        image: non_empty(image),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}
