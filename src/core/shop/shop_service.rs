// Coin shop: timed cosmetic roles paid for with server coins.
//
// The service charges the buyer and tracks when each granted role runs out.
// Creating, assigning and removing the roles is left to the Discord layer,
// which drains `take_due` from a background loop.

use crate::core::economy::{CoinStore, EconomyError, EconomyService};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

pub const ITEM_DURATION_HOURS: i64 = 12;

const MAX_ROLE_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShopItem {
    NickColor,
    CustomRole,
    XpBooster,
}

impl ShopItem {
    pub const ALL: [ShopItem; 3] = [
        ShopItem::NickColor,
        ShopItem::CustomRole,
        ShopItem::XpBooster,
    ];

    pub fn price(self) -> i64 {
        match self {
            ShopItem::NickColor => 1000,
            ShopItem::CustomRole => 2000,
            ShopItem::XpBooster => 5000,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShopItem::NickColor => "Nickname color",
            ShopItem::CustomRole => "Custom role",
            ShopItem::XpBooster => "2x XP booster",
        }
    }

    pub fn duration(self) -> Duration {
        Duration::hours(ITEM_DURATION_HOURS)
    }
}

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("Role names must be 1 to {MAX_ROLE_NAME_CHARS} characters")]
    InvalidRoleName,

    #[error("`{0}` is not a hex color like #FF00FF")]
    InvalidColor(String),

    #[error(transparent)]
    Economy(#[from] EconomyError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub item: ShopItem,
    pub paid: i64,
    pub balance: i64,
    pub expires_at: DateTime<Utc>,
    /// True when this purchase id was already charged.
    pub replayed: bool,
}

/// A role to take back once its time is up.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleExpiry {
    pub guild_id: u64,
    pub user_id: u64,
    pub role_id: u64,
    /// Custom roles are deleted from the guild instead of just removed.
    pub delete_role: bool,
    pub expires_at: DateTime<Utc>,
}

/// Parse `#RRGGBB` (the `#` is optional) into a role color.
pub fn parse_hex_color(raw: &str) -> Result<u32, ShopError> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ShopError::InvalidColor(raw.trim().to_string()));
    }
    u32::from_str_radix(hex, 16).map_err(|_| ShopError::InvalidColor(raw.trim().to_string()))
}

pub fn validate_role_name(raw: &str) -> Result<String, ShopError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_ROLE_NAME_CHARS {
        return Err(ShopError::InvalidRoleName);
    }
    Ok(name.to_string())
}

pub struct ShopService<S: CoinStore> {
    economy: Arc<EconomyService<S>>,
    expiries: DashMap<(u64, u64), RoleExpiry>,
}

impl<S: CoinStore> ShopService<S> {
    pub fn new(economy: Arc<EconomyService<S>>) -> Self {
        Self {
            economy,
            expiries: DashMap::new(),
        }
    }

    /// Charge `user_id` for `item`. `purchase_id` is the interaction that
    /// made the purchase, so a retried interaction is charged once.
    pub async fn purchase(
        &self,
        user_id: u64,
        item: ShopItem,
        purchase_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Purchase, ShopError> {
        let price = item.price();
        self.economy.ensure_affordable(user_id, price).await?;

        let key = format!("shop:{purchase_id}");
        let settlement = self.economy.settle(&key, user_id, -price).await?;

        tracing::info!(user_id, item = item.name(), price, "Shop purchase");
        Ok(Purchase {
            item,
            paid: -settlement.delta,
            balance: settlement.new_balance,
            expires_at: now + item.duration(),
            replayed: settlement.replayed,
        })
    }

    /// Give the coins back when the role could not be granted.
    pub async fn refund(
        &self,
        user_id: u64,
        purchase: &Purchase,
        purchase_id: u64,
    ) -> Result<i64, ShopError> {
        let key = format!("shop:{purchase_id}:refund");
        let settlement = self.economy.settle(&key, user_id, purchase.paid).await?;
        tracing::warn!(user_id, item = purchase.item.name(), "Shop purchase refunded");
        Ok(settlement.new_balance)
    }

    /// Track a granted role. Buying the same role again pushes its expiry out.
    pub fn schedule(&self, expiry: RoleExpiry) {
        self.expiries.insert((expiry.user_id, expiry.role_id), expiry);
    }

    /// Forget a color role the member swapped for another one.
    pub fn unschedule(&self, user_id: u64, role_id: u64) {
        self.expiries.remove(&(user_id, role_id));
    }

    /// Remove and return every expiry that is due at `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<RoleExpiry> {
        let due: Vec<(u64, u64)> = self
            .expiries
            .iter()
            .filter(|e| e.expires_at <= now)
            .map(|e| *e.key())
            .collect();

        due.into_iter()
            .filter_map(|key| self.expiries.remove(&key).map(|(_, expiry)| expiry))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::economy::BalanceAction;
    use crate::infra::economy::InMemoryCoinStore;

    async fn shop_with(user: u64, coins: i64) -> ShopService<InMemoryCoinStore> {
        let economy = Arc::new(EconomyService::new(InMemoryCoinStore::new()));
        economy.modify(user, BalanceAction::Set, coins).await.unwrap();
        ShopService::new(economy)
    }

    fn expiry(user_id: u64, role_id: u64, expires_at: DateTime<Utc>) -> RoleExpiry {
        RoleExpiry {
            guild_id: 1,
            user_id,
            role_id,
            delete_role: false,
            expires_at,
        }
    }

    #[tokio::test]
    async fn purchase_charges_the_price_once() {
        let shop = shop_with(1, 5000).await;
        let now = Utc::now();

        let purchase = shop.purchase(1, ShopItem::CustomRole, 900, now).await.unwrap();
        assert_eq!(purchase.paid, 2000);
        assert_eq!(purchase.balance, 3000);
        assert_eq!(purchase.expires_at, now + Duration::hours(12));
        assert!(!purchase.replayed);

        let retry = shop.purchase(1, ShopItem::CustomRole, 900, now).await.unwrap();
        assert!(retry.replayed);
        assert_eq!(retry.paid, 2000);
        assert_eq!(shop.economy.balance(1).await.unwrap(), 3000);
    }

    #[tokio::test]
    async fn purchase_needs_the_full_price() {
        let shop = shop_with(1, 4999).await;
        assert!(matches!(
            shop.purchase(1, ShopItem::XpBooster, 1, Utc::now()).await,
            Err(ShopError::Economy(EconomyError::InsufficientFunds {
                required: 5000,
                available: 4999
            }))
        ));
    }

    #[tokio::test]
    async fn refund_returns_what_was_paid() {
        let shop = shop_with(1, 1000).await;
        let purchase = shop.purchase(1, ShopItem::NickColor, 7, Utc::now()).await.unwrap();
        assert_eq!(purchase.balance, 0);

        assert_eq!(shop.refund(1, &purchase, 7).await.unwrap(), 1000);
        assert_eq!(shop.refund(1, &purchase, 7).await.unwrap(), 1000);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#FF00ff").unwrap(), 0xFF00FF);
        assert_eq!(parse_hex_color(" 00a0b0 ").unwrap(), 0x00A0B0);
        assert!(matches!(parse_hex_color("#FFF"), Err(ShopError::InvalidColor(_))));
        assert!(matches!(parse_hex_color("#GG0000"), Err(ShopError::InvalidColor(_))));
    }

    #[test]
    fn role_names_are_trimmed_and_bounded() {
        assert_eq!(validate_role_name("  Night Owl ").unwrap(), "Night Owl");
        assert!(validate_role_name("   ").is_err());
        assert!(validate_role_name(&"x".repeat(101)).is_err());
    }

    #[tokio::test]
    async fn only_due_roles_are_taken() {
        let shop = shop_with(1, 0).await;
        let now = Utc::now();
        shop.schedule(expiry(1, 10, now - Duration::minutes(1)));
        shop.schedule(expiry(1, 11, now + Duration::hours(1)));
        shop.schedule(expiry(2, 10, now));

        let mut due = shop.take_due(now);
        due.sort_by_key(|e| (e.user_id, e.role_id));
        assert_eq!(due, vec![expiry(1, 10, now - Duration::minutes(1)), expiry(2, 10, now)]);
        assert!(shop.take_due(now).is_empty());
        assert_eq!(shop.take_due(now + Duration::hours(2)).len(), 1);
    }

    #[tokio::test]
    async fn rebuying_extends_and_swapping_forgets() {
        let shop = shop_with(1, 0).await;
        let now = Utc::now();
        shop.schedule(expiry(1, 10, now));
        shop.schedule(expiry(1, 10, now + Duration::hours(12)));
        assert!(shop.take_due(now).is_empty());

        shop.schedule(expiry(1, 20, now));
        shop.unschedule(1, 20);
        assert_eq!(shop.take_due(now + Duration::days(1)).len(), 1);
    }
}
