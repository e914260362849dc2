//! Stripe Connect onboarding links for gym owners.
//!
//! The gateway is a trait so the real Connect client can be swapped for
//! [`MockConnectGateway`] in development and tests. Errors carry the callable
//! error codes the admin UI switches on.

use gymbook_core::{BookingStore, Gym, GymId, StoreError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Gateway result
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Connect gateway error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Connect gateway error: {message}")]
pub struct GatewayError {
    /// What the gateway reported
    pub message: String,
}

/// Connect account operations.
pub trait ConnectGateway: Send + Sync {
    /// Create a connected account for `gym`, returning its id.
    ///
    /// # Errors
    ///
    /// Returns error if the gateway rejects the request
    fn create_account(
        &self,
        gym: &Gym,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send + '_>>;

    /// Create an onboarding link for `account_id`, returning its url.
    ///
    /// # Errors
    ///
    /// Returns error if the gateway rejects the request
    fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send + '_>>;
}

/// Mock gateway that hands out deterministic account ids and links.
#[derive(Debug, Default)]
pub struct MockConnectGateway {
    failing: AtomicBool,
}

impl MockConnectGateway {
    /// Creates a gateway that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn ConnectGateway> {
        Arc::new(Self::new())
    }

    /// Make every following call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> GatewayResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(GatewayError {
                message: "mock gateway unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl ConnectGateway for MockConnectGateway {
    fn create_account(
        &self,
        gym: &Gym,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send + '_>> {
        let account_id = format!("acct_{}", gym.id);
        Box::pin(async move {
            self.check()?;
            tracing::info!(account_id = %account_id, "Mock connected account created");
            Ok(account_id)
        })
    }

    fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send + '_>> {
        let url = format!(
            "https://connect.stripe.test/setup/{account_id}/{}",
            uuid::Uuid::new_v4().simple()
        );
        tracing::debug!(refresh_url, return_url, "Mock account link requested");
        Box::pin(async move {
            self.check()?;
            Ok(url)
        })
    }
}

/// Callable error, serialized by its code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountLinkError {
    /// No caller identity
    #[error("{0}")]
    Unauthenticated(String),
    /// Missing or malformed argument
    #[error("{0}")]
    InvalidArgument(String),
    /// The caller may not link this gym, or the origin is not allowed
    #[error("{0}")]
    PermissionDenied(String),
    /// Gateway or storage failure
    #[error("{0}")]
    Internal(String),
}

impl AccountLinkError {
    /// Wire code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::InvalidArgument(_) => "invalid-argument",
            Self::PermissionDenied(_) => "permission-denied",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for AccountLinkError {
    fn from(error: StoreError) -> Self {
        tracing::error!(error = %error, "Account link storage failure");
        Self::Internal("Failed to load gym".to_string())
    }
}

impl From<GatewayError> for AccountLinkError {
    fn from(error: GatewayError) -> Self {
        tracing::error!(error = %error, "Account link gateway failure");
        Self::Internal("Failed to create account link".to_string())
    }
}

/// Request body of `create_account_link`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountLinkRequest {
    /// Gym to onboard
    pub gym_id: String,
    /// Admin UI origin the link returns to
    pub origin: String,
}

/// Response of `create_account_link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountLink {
    /// Onboarding url
    pub url: String,
}

/// Creates onboarding links for gym owners.
#[derive(Clone)]
pub struct AccountLinkService {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn ConnectGateway>,
    allowed_origins: Vec<String>,
}

impl AccountLinkService {
    /// Creates the service. Origins are compared exactly, without a trailing `/`.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn ConnectGateway>,
        allowed_origins: Vec<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            allowed_origins,
        }
    }

    /// Create an onboarding link for the caller's gym, creating the connected
    /// account on first use.
    ///
    /// # Errors
    ///
    /// - `unauthenticated`: no caller
    /// - `invalid-argument`: empty `gym_id` or `origin`, or unknown gym
    /// - `permission-denied`: origin not allowed, or caller does not own the gym
    /// - `internal`: gateway or storage failure
    pub async fn create_account_link(
        &self,
        caller: Option<&str>,
        request: &AccountLinkRequest,
    ) -> Result<AccountLink, AccountLinkError> {
        let caller = caller
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| AccountLinkError::Unauthenticated("Sign in required".to_string()))?;

        let gym_id = request.gym_id.trim();
        let origin = request.origin.trim().trim_end_matches('/');
        if gym_id.is_empty() || origin.is_empty() {
            return Err(AccountLinkError::InvalidArgument(
                "gymId and origin are required".to_string(),
            ));
        }
        if !self.allowed_origins.iter().any(|allowed| allowed == origin) {
            tracing::warn!(origin, "Account link requested from disallowed origin");
            return Err(AccountLinkError::PermissionDenied(
                "Origin not allowed".to_string(),
            ));
        }

        let gym_id = GymId::new(gym_id);
        let gym = self
            .store
            .gym(&gym_id)
            .await?
            .ok_or_else(|| AccountLinkError::InvalidArgument("Gym not found".to_string()))?;
        if gym.owner_id.as_ref().is_none_or(|owner| owner.as_str() != caller) {
            return Err(AccountLinkError::PermissionDenied(
                "Only the gym owner can connect payments".to_string(),
            ));
        }

        let account_id = match gym.stripe_account_id.clone() {
            Some(account_id) => account_id,
            None => self.claim_account(&gym).await?,
        };

        let refresh_url = format!("{origin}/admin/settings?stripe=refresh");
        let return_url = format!("{origin}/admin/settings?stripe=return");
        let url = self
            .gateway
            .create_account_link(&account_id, &refresh_url, &return_url)
            .await?;

        tracing::info!(gym_id = %gym_id, account_id = %account_id, "Account link created");
        Ok(AccountLink { url })
    }
}

impl AccountLinkService {
    /// Create a connected account and record it on the gym. A request that
    /// lost the race to another one adopts the account already recorded.
    async fn claim_account(&self, gym: &Gym) -> Result<String, AccountLinkError> {
        let created = self.gateway.create_account(gym).await?;
        let held = self
            .store
            .claim_connect_account(&gym.id, &created)
            .await?
            .ok_or_else(|| AccountLinkError::InvalidArgument("Gym not found".to_string()))?;
        if held != created {
            tracing::warn!(
                gym_id = %gym.id,
                kept = %held,
                discarded = %created,
                "Gym already had a connected account, discarding the new one"
            );
        }
        Ok(held)
    }
}

impl std::fmt::Debug for AccountLinkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountLinkService")
            .field("allowed_origins", &self.allowed_origins)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gymbook_testing::{InMemoryBookingStore, fixtures};

    const ORIGIN: &str = "https://admin.irontemple.test";

    async fn setup() -> (InMemoryBookingStore, Arc<MockConnectGateway>, AccountLinkService) {
        let store = InMemoryBookingStore::new();
        store.put_gym(fixtures::gym()).await.unwrap();
        let gateway = Arc::new(MockConnectGateway::new());
        let service = AccountLinkService::new(
            Arc::new(store.clone()),
            gateway.clone(),
            vec![ORIGIN.to_string()],
        );
        (store, gateway, service)
    }

    fn request(origin: &str) -> AccountLinkRequest {
        AccountLinkRequest {
            gym_id: "gym-1".to_string(),
            origin: origin.to_string(),
        }
    }

    #[tokio::test]
    async fn owner_gets_a_link_and_the_account_is_saved() {
        let (store, _, service) = setup().await;

        let link = service
            .create_account_link(Some("owner"), &request(ORIGIN))
            .await
            .unwrap();

        assert!(link.url.starts_with("https://connect.stripe.test/setup/acct_gym-1/"));
        let gym = store.gym(&fixtures::gym_id()).await.unwrap().unwrap();
        assert_eq!(gym.stripe_account_id.as_deref(), Some("acct_gym-1"));
    }

    #[tokio::test]
    async fn checks_run_in_order() {
        let (_, _, service) = setup().await;

        let err = service
            .create_account_link(None, &request("https://evil.test"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unauthenticated");

        let err = service
            .create_account_link(Some("owner"), &request(""))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid-argument");

        let err = service
            .create_account_link(Some("owner"), &request("https://evil.test"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "permission-denied");

        let err = service
            .create_account_link(Some("stranger"), &request(ORIGIN))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "permission-denied");
    }

    #[tokio::test]
    async fn trailing_slash_on_origin_is_ignored() {
        let (_, _, service) = setup().await;

        let link = service
            .create_account_link(Some("owner"), &request("https://admin.irontemple.test/"))
            .await;

        assert!(link.is_ok());
    }

    #[tokio::test]
    async fn gateway_failure_is_internal() {
        let (store, gateway, service) = setup().await;
        gateway.set_failing(true);

        let err = service
            .create_account_link(Some("owner"), &request(ORIGIN))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "internal");
        let gym = store.gym(&fixtures::gym_id()).await.unwrap().unwrap();
        assert!(gym.stripe_account_id.is_none());
    }

    /// Stands in for another request (or an admin edit) landing while the
    /// connected account is being created.
    struct RacingGateway {
        store: InMemoryBookingStore,
        inner: MockConnectGateway,
    }

    impl ConnectGateway for RacingGateway {
        fn create_account(
            &self,
            gym: &Gym,
        ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send + '_>> {
            let gym_id = gym.id.clone();
            Box::pin(async move {
                let mut stored = self.store.gym(&gym_id).await.unwrap().unwrap();
                stored.stripe_account_id = Some("acct_first".to_string());
                stored.booking_rules.cancellation_window_minutes = Some(45);
                self.store.put_gym(stored).await.unwrap();
                Ok("acct_second".to_string())
            })
        }

        fn create_account_link(
            &self,
            account_id: &str,
            refresh_url: &str,
            return_url: &str,
        ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send + '_>> {
            self.inner
                .create_account_link(account_id, refresh_url, return_url)
        }
    }

    #[tokio::test]
    async fn concurrent_setup_keeps_the_first_account_and_other_edits() {
        let store = InMemoryBookingStore::new();
        store.put_gym(fixtures::gym()).await.unwrap();
        let service = AccountLinkService::new(
            Arc::new(store.clone()),
            Arc::new(RacingGateway {
                store: store.clone(),
                inner: MockConnectGateway::new(),
            }),
            vec![ORIGIN.to_string()],
        );

        let link = service
            .create_account_link(Some("owner"), &request(ORIGIN))
            .await
            .unwrap();

        assert!(link.url.starts_with("https://connect.stripe.test/setup/acct_first/"));
        let gym = store.gym(&fixtures::gym_id()).await.unwrap().unwrap();
        assert_eq!(gym.stripe_account_id.as_deref(), Some("acct_first"));
        assert_eq!(gym.booking_rules.cancellation_window_minutes, Some(45));
    }

    #[tokio::test]
    async fn existing_account_is_reused() {
        let (store, _, service) = setup().await;
        let mut gym = fixtures::gym();
        gym.stripe_account_id = Some("acct_existing".to_string());
        store.put_gym(gym).await.unwrap();

        let link = service
            .create_account_link(Some("owner"), &request(ORIGIN))
            .await
            .unwrap();

        assert!(link.url.starts_with("https://connect.stripe.test/setup/acct_existing/"));
    }
}
