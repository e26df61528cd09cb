//! Session token and login/logout.
//!
//! The token cell is shared with the REST client (which clears it on an
//! invalid-token answer) and the Connection Manager (which reads it on connect).

use std::sync::Arc;

use crate::{
    domain::{ApiError, Credentials, RestApi, Signal, StorageError},
    error::ClientError,
    infrastructure::storage::{LocalStore, TOKEN_KEY},
};

/// Token cell backed by the local store.
#[derive(Clone)]
pub struct TokenStore {
    token: Signal<Option<String>>,
    storage: Arc<LocalStore>,
}

impl TokenStore {
    /// Restore the persisted token, if any.
    pub fn load(storage: Arc<LocalStore>) -> Self {
        let token = storage
            .get::<String>(TOKEN_KEY)
            .filter(|token| !token.is_empty());
        if token.is_some() {
            tracing::info!("Restored session token");
        }
        Self {
            token: Signal::new(token),
            storage,
        }
    }

    pub fn token(&self) -> Signal<Option<String>> {
        self.token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.with(|token| token.is_some())
    }

    pub fn set(&self, token: String) -> Result<(), StorageError> {
        self.token.set(Some(token.clone()));
        self.storage.set(TOKEN_KEY, &token)
    }

    /// Forget the token in memory and on disk. Safe to call repeatedly.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.token.update_if(|token| token.as_ref().map(|_| None));
        self.storage.remove(TOKEN_KEY)
    }
}

#[derive(Clone)]
pub struct AuthService {
    api: Arc<dyn RestApi>,
    tokens: TokenStore,
}

impl AuthService {
    pub fn new(api: Arc<dyn RestApi>, tokens: TokenStore) -> Self {
        Self { api, tokens }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput(
                "username and password are required".to_string(),
            ));
        }

        let token = self
            .api
            .login(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        if token.is_empty() {
            return Err(ApiError::MissingData.into());
        }
        self.tokens.set(token)?;
        tracing::info!("Logged in as '{}'", username);
        Ok(())
    }

    /// Local state is cleared first; the server call is best effort.
    pub async fn logout(&self) {
        if let Err(e) = self.tokens.clear() {
            tracing::warn!("Failed to remove stored token: {}", e);
        }
        if let Err(e) = self.api.logout().await {
            tracing::debug!("Server logout failed: {}", e);
        }
        tracing::info!("Logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rest::MockRestApi;

    fn tokens() -> TokenStore {
        TokenStore::load(Arc::new(LocalStore::in_memory()))
    }

    #[tokio::test]
    async fn test_login_stores_and_persists_token() {
        // テスト項目: ログインに成功するとトークンがセルとローカルストアに保存される
        // given (前提条件):
        let mut api = MockRestApi::new();
        api.expect_login()
            .withf(|c| c.username == "alice" && c.password == "secret")
            .times(1)
            .returning(|_| Ok("tok-1".to_string()));
        let tokens = tokens();
        let auth = AuthService::new(Arc::new(api), tokens.clone());

        // when (操作):
        let result = auth.login("alice", "secret").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(tokens.token().get().as_deref(), Some("tok-1"));
        assert_eq!(
            tokens.storage.get::<String>(TOKEN_KEY).as_deref(),
            Some("tok-1")
        );
    }

    #[tokio::test]
    async fn test_login_rejects_empty_credentials_without_request() {
        // テスト項目: 空の認証情報ではリクエストを送らずにエラーになる
        // given (前提条件):
        let mut api = MockRestApi::new();
        api.expect_login().times(0);
        let auth = AuthService::new(Arc::new(api), tokens());

        // when (操作):
        let result = auth.login("", "secret").await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
        assert!(!auth.tokens().is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_token_even_if_server_fails() {
        // テスト項目: サーバーのログアウトが失敗してもトークンは破棄される
        // given (前提条件):
        let mut api = MockRestApi::new();
        api.expect_logout()
            .times(1)
            .returning(|| Err(ApiError::InvalidToken));
        let tokens = tokens();
        tokens.set("tok-1".to_string()).unwrap();
        let auth = AuthService::new(Arc::new(api), tokens.clone());

        // when (操作):
        auth.logout().await;

        // then (期待する結果):
        assert!(!tokens.is_authenticated());
        assert_eq!(tokens.storage.get::<String>(TOKEN_KEY), None);
    }

    #[test]
    fn test_load_restores_persisted_token() {
        // テスト項目: ローカルストアに保存済みのトークンが起動時に復元される
        // given (前提条件):
        let storage = Arc::new(LocalStore::in_memory());
        storage.set(TOKEN_KEY, &"tok-9").unwrap();

        // when (操作):
        let tokens = TokenStore::load(storage);

        // then (期待する結果):
        assert_eq!(tokens.token().get().as_deref(), Some("tok-9"));
    }
}
