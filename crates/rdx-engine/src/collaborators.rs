//! Collaborators the engine calls after a unit of work has committed.
//!
//! Both are best-effort: a failing notifier or price source is logged and
//! ignored, and can never undo a committed change.

use std::collections::HashMap;

use rdx_types::{Notification, RdxError, Result};
use rust_decimal::Decimal;
use tokio::sync::mpsc;

/// Delivers user notifications (push, email, in-app...).
pub trait Notifier: Send + Sync {
    /// Hand off one notification. Must not block on delivery.
    fn notify(&self, notification: Notification) -> Result<()>;
}

/// Supplies display prices. Never used for accounting.
pub trait PriceSource: Send + Sync {
    /// Price of one unit of `asset`, or `None` if unknown.
    fn price(&self, asset: &str) -> Result<Option<Decimal>>;
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notification: Notification) -> Result<()> {
        Ok(())
    }
}

/// Forwards notifications into a bounded tokio channel.
///
/// A full or closed channel is reported as [`RdxError::Collaborator`]; the
/// engine logs it and moves on.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end for the delivery task.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) -> Result<()> {
        self.tx
            .try_send(notification)
            .map_err(|e| RdxError::Collaborator(format!("notification channel: {e}")))
    }
}

/// Fixed price table.
#[derive(Debug, Default, Clone)]
pub struct StaticPrices {
    prices: HashMap<String, Decimal>,
}

impl StaticPrices {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, asset: &str, price: Decimal) -> Self {
        self.prices.insert(asset.to_string(), price);
        self
    }
}

impl PriceSource for StaticPrices {
    fn price(&self, asset: &str) -> Result<Option<Decimal>> {
        Ok(self.prices.get(asset).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdx_types::{NotificationCategory, UserId};

    #[tokio::test]
    async fn channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::new(4);
        let user = UserId::new();
        notifier
            .notify(Notification::new(user, "Hello", "World", NotificationCategory::System))
            .unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.user_id, user);
        assert_eq!(got.title, "Hello");
    }

    #[test]
    fn full_channel_is_collaborator_error() {
        let (notifier, _rx) = ChannelNotifier::new(1);
        let user = UserId::new();
        let n = Notification::new(user, "a", "b", NotificationCategory::Reward);
        notifier.notify(n.clone()).unwrap();
        assert!(matches!(notifier.notify(n), Err(RdxError::Collaborator(_))));
    }

    #[test]
    fn closed_channel_is_collaborator_error() {
        let (notifier, rx) = ChannelNotifier::new(1);
        drop(rx);
        let n = Notification::new(UserId::new(), "a", "b", NotificationCategory::Reward);
        assert!(notifier.notify(n).is_err());
    }

    #[test]
    fn static_prices_lookup() {
        let prices = StaticPrices::new().with("BTC", Decimal::new(65_000, 0));
        assert_eq!(prices.price("BTC").unwrap(), Some(Decimal::new(65_000, 0)));
        assert_eq!(prices.price("DOGE").unwrap(), None);
    }
}
