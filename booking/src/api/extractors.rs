//! Caller identity extractor.

use super::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use gymbook_core::{Actor, MemberId};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header flagging the caller as a gym admin.
pub const ADMIN_HEADER: &str = "x-admin";

/// Who is calling, as asserted by the upstream auth proxy.
///
/// Never rejects: handlers decide whether an anonymous caller is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    /// Authenticated user id
    pub user_id: Option<String>,
    /// Whether the caller administers the gym
    pub admin: bool,
}

impl Caller {
    /// The caller as a ledger actor. Non-admins act through the system.
    #[must_use]
    pub fn actor(&self) -> Actor {
        match (&self.user_id, self.admin) {
            (Some(uid), true) => Actor::Admin(uid.clone()),
            _ => Actor::System,
        }
    }

    /// The caller's id, or 401.
    ///
    /// # Errors
    ///
    /// Returns 401 when no user id was sent.
    pub fn require_user(&self) -> Result<&str, ApiError> {
        self.user_id.as_deref().ok_or_else(ApiError::unauthorized)
    }

    /// Succeeds for admins only.
    ///
    /// # Errors
    ///
    /// Returns 401 for anonymous callers and 403 for non-admins.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        self.require_user()?;
        if self.admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Gym admin rights required"))
        }
    }

    /// Succeeds when the caller is `member_id` or an admin.
    ///
    /// # Errors
    ///
    /// Returns 401 for anonymous callers and 403 for other members.
    pub fn require_self_or_admin(&self, member_id: &MemberId) -> Result<(), ApiError> {
        let uid = self.require_user()?;
        if self.admin || uid == member_id.as_str() {
            Ok(())
        } else {
            Err(ApiError::forbidden(
                "Members can only act on their own bookings",
            ))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .map(str::to_string);
        let admin = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(Self { user_id, admin })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_flag_without_identity_is_not_an_admin_actor() {
        let caller = Caller {
            user_id: None,
            admin: true,
        };
        assert_eq!(caller.actor(), Actor::System);
        assert!(caller.require_admin().is_err());
    }

    #[test]
    fn members_act_only_for_themselves() {
        let caller = Caller {
            user_id: Some("alice".to_string()),
            admin: false,
        };
        assert!(caller.require_self_or_admin(&MemberId::new("alice")).is_ok());
        assert!(caller.require_self_or_admin(&MemberId::new("bob")).is_err());
    }
}
