//! Account types and storage.

pub mod sea_orm_store;
pub mod storage;

pub use sea_orm_store::SeaOrmAccountStore;
pub use storage::{AccountStore, InMemoryAccountStore, NewAccount, ProfileUpdate};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member account.
///
/// Credentials are optional because an account can be created through any of
/// the login paths (email+password, phone OTP, Google sign-in).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub google_sub: Option<String>,
    pub name: Option<String>,
    pub plan_tier: Option<PlanTier>,
    pub plan_status: PlanStatus,
    pub plan_started_at: Option<DateTime<Utc>>,
    pub plan_ends_at: Option<DateTime<Utc>>,
    /// Denormalized carbon-coin balance, kept in sync by the ledger store.
    pub coin_balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Whether the account currently holds an active subscription.
    #[must_use]
    pub fn has_active_plan(&self) -> bool {
        self.plan_status == PlanStatus::Active
            && self.plan_ends_at.is_some_and(|end| end > Utc::now())
    }
}

/// The three fixed subscription tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Resident,
    Ambassador,
    Guardian,
}

impl PlanTier {
    /// Parse a client-supplied tier selector. Unknown selectors are rejected.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resident" => Some(Self::Resident),
            "ambassador" => Some(Self::Ambassador),
            "guardian" => Some(Self::Guardian),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resident => "resident",
            Self::Ambassador => "ambassador",
            Self::Guardian => "guardian",
        }
    }

    #[must_use]
    pub fn all() -> [Self; 3] {
        [Self::Resident, Self::Ambassador, Self::Guardian]
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription status on the account record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Inactive,
    Active,
    Expired,
    Cancelled,
}

impl PlanStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "expired" => Self::Expired,
            "cancelled" => Self::Cancelled,
            _ => Self::Inactive,
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse() {
        assert_eq!(PlanTier::parse("resident"), Some(PlanTier::Resident));
        assert_eq!(PlanTier::parse("ambassador"), Some(PlanTier::Ambassador));
        assert_eq!(PlanTier::parse("guardian"), Some(PlanTier::Guardian));
        assert_eq!(PlanTier::parse("platinum"), None);
        assert_eq!(PlanTier::parse(""), None);
        assert_eq!(PlanTier::parse("Resident"), None);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            PlanStatus::Inactive,
            PlanStatus::Active,
            PlanStatus::Expired,
            PlanStatus::Cancelled,
        ] {
            assert_eq!(PlanStatus::from_str(status.as_str()), status);
        }
        assert_eq!(PlanStatus::from_str("garbage"), PlanStatus::Inactive);
    }

    #[test]
    fn test_has_active_plan() {
        let mut account = Account {
            id: Uuid::new_v4(),
            email: Some("m@example.com".to_string()),
            phone: None,
            password_hash: None,
            google_sub: None,
            name: None,
            plan_tier: Some(PlanTier::Resident),
            plan_status: PlanStatus::Active,
            plan_started_at: Some(Utc::now()),
            plan_ends_at: Some(Utc::now() + chrono::Duration::days(10)),
            coin_balance: 0,
            created_at: Utc::now(),
        };
        assert!(account.has_active_plan());

        account.plan_ends_at = Some(Utc::now() - chrono::Duration::days(1));
        assert!(!account.has_active_plan());

        account.plan_ends_at = Some(Utc::now() + chrono::Duration::days(1));
        account.plan_status = PlanStatus::Cancelled;
        assert!(!account.has_active_plan());
    }
}
