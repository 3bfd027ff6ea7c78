//! Quality tiers, order statuses, rate cards, and money helpers.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::RechercheError;

/// Quality tier of a recherche order. Controls which providers run and the
/// per-new-result price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Bulk listings only; cheapest per result.
    Standard,
    /// Rich place data only.
    Premium,
    /// Both sources combined.
    Komplett,
}

impl QualityTier {
    /// Stable string form as stored on orders.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Komplett => "komplett",
        }
    }

    /// All tiers, in ascending price order.
    pub const ALL: [Self; 3] = [Self::Standard, Self::Premium, Self::Komplett];
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = RechercheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "komplett" => Ok(Self::Komplett),
            other => Err(RechercheError::unknown_tier(other)),
        }
    }
}

/// Lifecycle status of a recherche order.
///
/// `Confirmed` orders are lease-eligible; a lease moves the order to
/// `Processing`; the pipeline ends it in `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created but not yet confirmed; never leased.
    Draft,
    /// Confirmed and waiting for a worker.
    Confirmed,
    /// Leased by a worker; the pipeline is running.
    Processing,
    /// Terminal: settled and counted.
    Completed,
    /// Terminal: the lease failed; error message recorded.
    Failed,
}

impl OrderStatus {
    /// Stable string form as stored on orders.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this status ends the order's lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = RechercheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(RechercheError::InvalidArg(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// Per-partner pricing: a flat base fee per order plus a per-new-result
/// price per tier. Amounts are euros; conversion to cents happens at the
/// cost calculator and must be exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCard {
    /// Flat fee charged for every completed order, in EUR.
    pub base_fee: Decimal,
    /// Price per newly created company at tier standard, in EUR.
    pub per_result_standard: Decimal,
    /// Price per newly created company at tier premium, in EUR.
    pub per_result_premium: Decimal,
    /// Price per newly created company at tier komplett, in EUR.
    pub per_result_komplett: Decimal,
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            base_fee: Decimal::new(50, 2),
            per_result_standard: Decimal::new(5, 2),
            per_result_premium: Decimal::new(12, 2),
            per_result_komplett: Decimal::new(18, 2),
        }
    }
}

impl RateCard {
    /// Per-new-result price for the given tier, in EUR.
    #[must_use]
    pub const fn per_result(&self, tier: QualityTier) -> Decimal {
        match tier {
            QualityTier::Standard => self.per_result_standard,
            QualityTier::Premium => self.per_result_premium,
            QualityTier::Komplett => self.per_result_komplett,
        }
    }
}

/// Per-partner fixed-window rate limits. A limit of 0 means unlimited for
/// that window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// Calls allowed per 60 s window.
    pub per_minute: u32,
    /// Calls allowed per 3600 s window.
    pub per_hour: u32,
    /// Calls allowed per 86 400 s window.
    pub per_day: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1000,
            per_day: 10_000,
        }
    }
}

/// Convert a euro amount to integer cents, rejecting amounts that do not
/// scale to whole cents (e.g. a 0.001 EUR rate-card entry).
///
/// # Errors
/// `InvalidMoney` when the scaled amount has a fractional part or does not
/// fit an `i64`.
pub fn euros_to_cents(amount: Decimal) -> Result<i64, RechercheError> {
    let scaled = amount * Decimal::from(100);
    if scaled.fract() != Decimal::ZERO {
        return Err(RechercheError::InvalidMoney(format!(
            "{amount} EUR does not scale to whole cents"
        )));
    }
    scaled
        .to_i64()
        .ok_or_else(|| RechercheError::InvalidMoney(format!("{amount} EUR out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_round_trips_through_strings() {
        for tier in QualityTier::ALL {
            assert_eq!(tier.as_str().parse::<QualityTier>().unwrap(), tier);
        }
        assert!(matches!(
            "gold".parse::<QualityTier>(),
            Err(RechercheError::UnknownTier { .. })
        ));
    }

    #[test]
    fn default_rate_card_matches_published_prices() {
        let card = RateCard::default();
        assert_eq!(euros_to_cents(card.base_fee).unwrap(), 50);
        assert_eq!(
            euros_to_cents(card.per_result(QualityTier::Standard)).unwrap(),
            5
        );
        assert_eq!(
            euros_to_cents(card.per_result(QualityTier::Premium)).unwrap(),
            12
        );
        assert_eq!(
            euros_to_cents(card.per_result(QualityTier::Komplett)).unwrap(),
            18
        );
    }

    #[test]
    fn euros_to_cents_rejects_fractional_cents() {
        assert!(euros_to_cents(Decimal::new(1, 3)).is_err()); // 0.001 EUR
        assert_eq!(euros_to_cents(Decimal::new(1050, 3)).unwrap(), 105); // 1.050 EUR
        assert_eq!(euros_to_cents(Decimal::ZERO).unwrap(), 0);
        assert_eq!(euros_to_cents(Decimal::new(-250, 2)).unwrap(), -250);
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(!OrderStatus::Confirmed.is_terminal());
    }

    proptest::proptest! {
        #[test]
        fn whole_cent_amounts_round_trip(cents in -1_000_000_000i64..1_000_000_000i64) {
            let euros = Decimal::new(cents, 2);
            proptest::prop_assert_eq!(euros_to_cents(euros).unwrap(), cents);
        }
    }
}
