use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::VehicleId;

pub type UserId = Uuid;

pub const MAX_NAME_LEN: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Driver => "driver",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "driver" => Some(Role::Driver),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub assigned_vehicles: Vec<VehicleId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            email: email.into().trim().to_lowercase(),
            role,
            assigned_vehicles: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_assigned_vehicles(mut self, vehicles: Vec<VehicleId>) -> Self {
        self.assigned_vehicles = vehicles;
        self
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            role: self.role,
        }
    }
}

/// The authenticated caller of an operation.
///
/// Authentication happens upstream; whoever builds an `Actor` vouches for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// The local operator of the command-line tool.
    pub fn system_admin() -> Self {
        Self {
            user_id: Uuid::nil(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act on anything; everyone else only on what they created.
    pub fn owns_or_admin(&self, owner: UserId) -> bool {
        self.is_admin() || self.user_id == owner
    }
}

/// Loose shape check: one `@`, a non-empty local part, and a dotted domain
/// whose last label is 2-3 letters.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || local.contains(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return false;
    }
    let tld = labels[labels.len() - 1];
    (2..=3).contains(&tld.len()) && tld.chars().all(|c| c.is_ascii_alphabetic())
}
