//! Notification messages handed to the delivery collaborator after commit.
//!
//! The engine never waits on delivery; a notification describes something
//! that has already happened and cannot be rolled back.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Delivery category, used by the collaborator for routing and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Reward,
    Transaction,
    Security,
    System,
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reward => write!(f, "reward"),
            Self::Transaction => write!(f, "transaction"),
            Self::Security => write!(f, "security"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A user-facing message: (user, title, message, category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    #[must_use]
    pub fn new(
        user_id: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
        category: NotificationCategory,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            category,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_display() {
        assert_eq!(NotificationCategory::Reward.to_string(), "reward");
        assert_eq!(NotificationCategory::Transaction.to_string(), "transaction");
    }

    #[test]
    fn notification_serde_roundtrip() {
        let n = Notification::new(
            UserId::new(),
            "Daily Reward Claimed!",
            "You've earned 5 RDX",
            NotificationCategory::Reward,
        );
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains("\"reward\""));
        let back: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(n, back);
    }
}
