//! Resource types (public-ID prefixes) and segment scopes.

use serde::{Deserialize, Serialize};

/// Externally exposed resource kinds. Each owns a fixed lowercase prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Tenant.
    Tenant,
    /// Store.
    Store,
    /// Order.
    Order,
    /// Product.
    Product,
    /// Stock keeping unit.
    Sku,
    /// End user.
    User,
    /// Store member.
    Member,
    /// Wallet ledger entry.
    WalletLedger,
    /// Wallet recharge.
    WalletRecharge,
    /// Wallet freeze.
    WalletFreeze,
    /// Coupon.
    Coupon,
    /// Marketing campaign.
    Campaign,
}

impl ResourceType {
    /// Every resource type, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Tenant,
        Self::Store,
        Self::Order,
        Self::Product,
        Self::Sku,
        Self::User,
        Self::Member,
        Self::WalletLedger,
        Self::WalletRecharge,
        Self::WalletFreeze,
        Self::Coupon,
        Self::Campaign,
    ];

    /// The public-ID prefix.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Tenant => "tnt",
            Self::Store => "sto",
            Self::Order => "ord",
            Self::Product => "prd",
            Self::Sku => "sku",
            Self::User => "usr",
            Self::Member => "mbr",
            Self::WalletLedger => "wld",
            Self::WalletRecharge => "wrc",
            Self::WalletFreeze => "wfz",
            Self::Coupon => "cpn",
            Self::Campaign => "cmp",
        }
    }

    /// Look up a resource type by prefix.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.prefix() == prefix)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_prefix(s)
            .or_else(|| Self::ALL.into_iter().find(|t| t.name() == s))
            .ok_or_else(|| format!("unknown resource type '{s}'"))
    }
}

impl ResourceType {
    const fn name(self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Store => "store",
            Self::Order => "order",
            Self::Product => "product",
            Self::Sku => "sku",
            Self::User => "user",
            Self::Member => "member",
            Self::WalletLedger => "wallet_ledger",
            Self::WalletRecharge => "wallet_recharge",
            Self::WalletFreeze => "wallet_freeze",
            Self::Coupon => "coupon",
            Self::Campaign => "campaign",
        }
    }
}

/// Business scopes that own an independent long-ID sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScope {
    Order,
    OrderItem,
    Tenant,
    Store,
    Product,
    Sku,
    User,
    Member,
    Coupon,
    CouponTemplate,
    CouponGrantLog,
    CouponLock,
    CouponRedemption,
    WalletLedger,
    WalletRecharge,
    WalletFreeze,
    PointsAccount,
    PointsLedger,
    Campaign,
    CampaignExecutionLog,
    Growth,
}

impl IdScope {
    /// Every scope, in declaration order.
    pub const ALL: [Self; 21] = [
        Self::Order,
        Self::OrderItem,
        Self::Tenant,
        Self::Store,
        Self::Product,
        Self::Sku,
        Self::User,
        Self::Member,
        Self::Coupon,
        Self::CouponTemplate,
        Self::CouponGrantLog,
        Self::CouponLock,
        Self::CouponRedemption,
        Self::WalletLedger,
        Self::WalletRecharge,
        Self::WalletFreeze,
        Self::PointsAccount,
        Self::PointsLedger,
        Self::Campaign,
        Self::CampaignExecutionLog,
        Self::Growth,
    ];

    /// Stable storage key for this scope.
    #[must_use]
    pub const fn scope_name(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::OrderItem => "order_item",
            Self::Tenant => "tenant",
            Self::Store => "store",
            Self::Product => "product",
            Self::Sku => "sku",
            Self::User => "user",
            Self::Member => "member",
            Self::Coupon => "coupon",
            Self::CouponTemplate => "coupon_template",
            Self::CouponGrantLog => "coupon_grant_log",
            Self::CouponLock => "coupon_lock",
            Self::CouponRedemption => "coupon_redemption",
            Self::WalletLedger => "wallet_ledger",
            Self::WalletRecharge => "wallet_recharge",
            Self::WalletFreeze => "wallet_freeze",
            Self::PointsAccount => "points_account",
            Self::PointsLedger => "points_ledger",
            Self::Campaign => "campaign",
            Self::CampaignExecutionLog => "campaign_execution_log",
            Self::Growth => "growth",
        }
    }
}

impl std::fmt::Display for IdScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scope_name())
    }
}

impl std::str::FromStr for IdScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.scope_name() == s)
            .ok_or_else(|| format!("unknown id scope '{s}'"))
    }
}
