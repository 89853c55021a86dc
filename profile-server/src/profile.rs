//! Users created from an external identity provider's profile.
//!
//! The provider identifies a user by an OpenID-style URL whose `id` query
//! parameter carries the stable external id, e.g.
//! `https://www.google.com/accounts/o8/id?id=AItOawk...`. The first email is
//! the cache key.

use serde::{Deserialize, Serialize};

use crate::cache::{Fields, ProfileCache};
use crate::error::ProfileError;

const EXTERNAL_ID_MARKER: &str = "/id?id=";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileEmail {
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileName {
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub given_name: String,
}

/// Profile as delivered by the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProfile {
    pub id: String,
    #[serde(default)]
    pub emails: Vec<ProfileEmail>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub name: ProfileName,
}

impl ExternalProfile {
    /// The part of `id` after `/id?id=`, if present and non-empty.
    pub fn external_id(&self) -> Option<&str> {
        let (_, id) = self.id.split_once(EXTERNAL_ID_MARKER)?;
        (!id.is_empty()).then_some(id)
    }

    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(|e| e.value.as_str()).filter(|e| !e.is_empty())
    }

    fn to_fields(&self, external_id: &str) -> Fields {
        Fields::from([
            ("id".to_string(), external_id.to_string()),
            ("dname".to_string(), self.display_name.clone()),
            ("fname".to_string(), self.name.family_name.clone()),
            ("gname".to_string(), self.name.given_name.clone()),
        ])
    }
}

/// Return the cached user for this profile, creating it on first sight.
///
/// An existing record is returned as stored; the profile does not
/// overwrite it.
pub async fn find_or_create_by_external_id(
    cache: &dyn ProfileCache,
    profile: &ExternalProfile,
) -> Result<Fields, ProfileError> {
    let external_id = profile.external_id().ok_or_else(|| {
        ProfileError::InvalidProfile(format!("no external id in `{}`", profile.id))
    })?;
    let email = profile
        .primary_email()
        .ok_or_else(|| ProfileError::InvalidProfile("profile has no email".to_string()))?;

    if !cache.exists(email).await? {
        tracing::info!(email, "creating user from external profile");
        cache.write_fields(email, profile.to_fields(external_id)).await?;
    }

    cache
        .read_fields(email)
        .await?
        .ok_or_else(|| ProfileError::NotFound(email.to_string()))
}
