use serde::{Deserialize, Serialize};

use super::ids::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Mentor,
    Admin,
    #[serde(other)]
    Other,
}

impl Role {
    /// Whether members may open a conversation with this role.
    pub fn accepts_conversations(self) -> bool {
        matches!(self, Role::Mentor | Role::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicProfile {
    pub uid: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl PublicProfile {
    /// Username, or the email when no username was set.
    pub fn display_label(&self) -> &str {
        if self.username.trim().is_empty() {
            &self.email
        } else {
            &self.username
        }
    }
}
