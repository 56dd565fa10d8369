use thiserror::Error;

use crate::{
    domain::{
        ids::UserId,
        profile::{PublicProfile, Role},
    },
    usecases::identity::{ProfileSource, ProfileSourceError},
};

const MENTOR_ROLES: [Role; 2] = [Role::Mentor, Role::Admin];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListMentorsError {
    #[error("You must be logged in to see mentors.")]
    AuthenticationRequired,
    #[error("Failed to load mentors.")]
    TemporarilyUnavailable,
}

/// Profiles the current user can open a conversation with.
pub async fn list_mentors(
    source: &dyn ProfileSource,
    current_user: &UserId,
) -> Result<Vec<PublicProfile>, ListMentorsError> {
    let mut mentors: Vec<PublicProfile> = source
        .profiles_with_roles(&MENTOR_ROLES)
        .await
        .map_err(map_source_error)?
        .into_iter()
        .filter(|profile| &profile.uid != current_user && profile.role.accepts_conversations())
        .collect();

    mentors.sort_by(|left, right| {
        left.display_label()
            .to_lowercase()
            .cmp(&right.display_label().to_lowercase())
            .then_with(|| left.uid.cmp(&right.uid))
    });
    Ok(mentors)
}

fn map_source_error(error: ProfileSourceError) -> ListMentorsError {
    match error {
        ProfileSourceError::Unauthorized => ListMentorsError::AuthenticationRequired,
        ProfileSourceError::Unavailable | ProfileSourceError::InvalidData => {
            ListMentorsError::TemporarilyUnavailable
        }
    }
}
