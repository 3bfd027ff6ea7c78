//! Order pricing: a flat base fee plus a per-new-result marginal cost.
//!
//! Only newly created companies are billable; duplicates and updates are
//! free. Everything is computed in integer cents, and a rate card that
//! does not scale to whole cents is rejected rather than rounded.

use recherche_core::{QualityTier, RateCard, RechercheError, euros_to_cents};

/// Settled cost of an order in cents.
///
/// # Errors
/// `InvalidMoney` when the rate card does not scale to whole cents.
pub fn cost_cents(
    tier: QualityTier,
    new_count: u32,
    rate_card: &RateCard,
) -> Result<i64, RechercheError> {
    let base = euros_to_cents(rate_card.base_fee)?;
    let per_result = euros_to_cents(rate_card.per_result(tier))?;
    Ok(base + i64::from(new_count) * per_result)
}
