//! Current user profile and contacts.

use std::sync::Arc;

use crate::domain::{ApiError, ProfileUpdate, RestApi, Signal, User};

#[derive(Clone)]
pub struct ProfileService {
    api: Arc<dyn RestApi>,
    current_user: Signal<Option<User>>,
}

impl ProfileService {
    /// `current_user` is the same cell the conversation store reads "me" from.
    pub fn new(api: Arc<dyn RestApi>, current_user: Signal<Option<User>>) -> Self {
        Self { api, current_user }
    }

    pub fn current_user(&self) -> Signal<Option<User>> {
        self.current_user.clone()
    }

    pub async fn load_profile(&self) -> Result<User, ApiError> {
        let user = self.api.get_profile().await?;
        tracing::info!("Signed in as '{}'", user.username);
        self.current_user.set(Some(user.clone()));
        Ok(user)
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User, ApiError> {
        let user = self.api.update_profile(update).await?;
        self.current_user.set(Some(user.clone()));
        Ok(user)
    }

    pub async fn upload_avatar(
        &self,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<User, ApiError> {
        let user = self.api.upload_avatar(file_name.into(), bytes).await?;
        self.current_user.set(Some(user.clone()));
        Ok(user)
    }

    pub async fn contacts(&self) -> Result<Vec<User>, ApiError> {
        self.api.get_contacts().await
    }
}
