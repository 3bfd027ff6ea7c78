//! Partner records: rate cards and rate limits live directly on the row.

use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use rust_decimal::Decimal;

use recherche_core::{Partner, RateCard, RateLimits, RechercheError};

use crate::{Store, db_err, fmt_ts, new_id};

/// Parameters for a new partner.
#[derive(Debug, Clone)]
pub struct NewPartner {
    /// Display name.
    pub name: String,
    /// Pricing; defaults to the published rate card.
    pub rate_card: RateCard,
    /// Fixed-window limits; defaults to 60/1000/10000.
    pub rate_limits: RateLimits,
}

impl NewPartner {
    /// Partner with default pricing and limits.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate_card: RateCard::default(),
            rate_limits: RateLimits::default(),
        }
    }
}

fn parse_rate(raw: &str) -> Result<Decimal, RechercheError> {
    raw.parse()
        .map_err(|e| RechercheError::InvalidMoney(format!("bad rate '{raw}': {e}")))
}

struct PartnerRow {
    id: String,
    name: String,
    base_fee: String,
    per_standard: String,
    per_premium: String,
    per_komplett: String,
    per_minute: u32,
    per_hour: u32,
    per_day: u32,
    suspended: bool,
}

impl PartnerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            base_fee: row.get(2)?,
            per_standard: row.get(3)?,
            per_premium: row.get(4)?,
            per_komplett: row.get(5)?,
            per_minute: row.get(6)?,
            per_hour: row.get(7)?,
            per_day: row.get(8)?,
            suspended: row.get(9)?,
        })
    }
}

impl TryFrom<PartnerRow> for Partner {
    type Error = RechercheError;

    fn try_from(row: PartnerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            rate_card: RateCard {
                base_fee: parse_rate(&row.base_fee)?,
                per_result_standard: parse_rate(&row.per_standard)?,
                per_result_premium: parse_rate(&row.per_premium)?,
                per_result_komplett: parse_rate(&row.per_komplett)?,
            },
            rate_limits: RateLimits {
                per_minute: row.per_minute,
                per_hour: row.per_hour,
                per_day: row.per_day,
            },
            suspended: row.suspended,
        })
    }
}

const PARTNER_COLUMNS: &str = "id, name, kosten_recherche_grundgebuehr, \
kosten_recherche_standard, kosten_recherche_premium, kosten_recherche_komplett, \
rate_limit_pro_minute, rate_limit_pro_stunde, rate_limit_pro_tag, ist_gesperrt";

impl Store {
    /// Insert a partner.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn create_partner(&self, new: &NewPartner) -> Result<Partner, RechercheError> {
        let id = new_id();
        let now = fmt_ts(Utc::now());
        self.conn()
            .execute(
                "INSERT INTO api_partner (id, name, kosten_recherche_grundgebuehr, \
                 kosten_recherche_standard, kosten_recherche_premium, \
                 kosten_recherche_komplett, rate_limit_pro_minute, rate_limit_pro_stunde, \
                 rate_limit_pro_tag, erstellt_am) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    new.name,
                    new.rate_card.base_fee.to_string(),
                    new.rate_card.per_result_standard.to_string(),
                    new.rate_card.per_result_premium.to_string(),
                    new.rate_card.per_result_komplett.to_string(),
                    new.rate_limits.per_minute,
                    new.rate_limits.per_hour,
                    new.rate_limits.per_day,
                    now,
                ],
            )
            .map_err(db_err)?;
        self.partner_by_id(&id)?
            .ok_or_else(|| RechercheError::not_found(format!("partner {id}")))
    }

    /// Fetch a partner by id.
    ///
    /// # Errors
    /// `Database` on persistence failure; `InvalidMoney` when the stored
    /// rate card is unparseable.
    pub fn partner_by_id(&self, id: &str) -> Result<Option<Partner>, RechercheError> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {PARTNER_COLUMNS} FROM api_partner WHERE id = ?1"),
                params![id],
                PartnerRow::from_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(Partner::try_from).transpose()
    }
}
