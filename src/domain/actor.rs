use super::catalog::UserId;
use crate::error::{Result, SettlementError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
    /// The payment provider's callback channel.
    System,
}

impl FromStr for Role {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            "admin" => Ok(Self::Admin),
            "system" => Ok(Self::System),
            other => Err(SettlementError::Unauthenticated(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

/// The authenticated caller of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(SettlementError::Authorization(
                "administrator role required".to_string(),
            ))
        }
    }

    /// Owner of the resource, or an administrator.
    pub fn require_self_or_admin(&self, owner_id: &str) -> Result<()> {
        if self.is_admin() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(SettlementError::Authorization(format!(
                "user {} may not act on a resource owned by {owner_id}",
                self.user_id
            )))
        }
    }

    pub fn require_payment_callback(&self) -> Result<()> {
        if matches!(self.role, Role::System | Role::Admin) {
            Ok(())
        } else {
            Err(SettlementError::Authorization(
                "payment callbacks are restricted to the payment provider".to_string(),
            ))
        }
    }
}
