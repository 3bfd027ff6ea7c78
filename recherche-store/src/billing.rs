//! The credit ledger: balance account plus append-only transaction log.
//!
//! Every operation reads the balance, appends the ledger row, and updates
//! the balance inside a single SQLite transaction; the database write lock
//! makes the sequence serializable, so `balance_after_cents` always equals
//! the signed prefix-sum of the account's ledger.

use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use recherche_core::{
    BillingAccount, CreditTransaction, RechercheError, TransactionKind, TransactionRef,
};

use crate::{Store, db_err, fmt_ts, new_id, parse_ts};

const ACCOUNT_COLUMNS: &str = "id, partner_id, guthaben_cents, rechnungs_limit_cents, \
warnung_bei_cents, warnung_gesendet_am, ist_gesperrt, gesperrt_grund";

/// Outcome of a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Balance after the operation.
    pub balance_cents: i64,
    /// Id of the appended transaction row.
    pub transaction_id: String,
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<(BillingAccount, Option<String>)> {
    let warning_sent_at: Option<String> = row.get(5)?;
    Ok((
        BillingAccount {
            id: row.get(0)?,
            partner_id: row.get(1)?,
            balance_cents: row.get(2)?,
            credit_limit_cents: row.get(3)?,
            warning_threshold_cents: row.get(4)?,
            warning_sent_at: None,
            suspended: row.get(6)?,
            suspension_reason: row.get(7)?,
        },
        warning_sent_at,
    ))
}

fn load_account(
    conn: &Connection,
    partner_id: &str,
) -> Result<Option<BillingAccount>, RechercheError> {
    let row = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM api_billing_account WHERE partner_id = ?1"),
            params![partner_id],
            account_from_row,
        )
        .optional()
        .map_err(db_err)?;
    row.map(|(mut account, warning_sent_at)| {
        account.warning_sent_at = parse_ts(warning_sent_at)?;
        Ok(account)
    })
    .transpose()
}

fn get_or_create_account(
    conn: &Connection,
    partner_id: &str,
) -> Result<BillingAccount, RechercheError> {
    if let Some(account) = load_account(conn, partner_id)? {
        return Ok(account);
    }
    let now = fmt_ts(Utc::now());
    conn.execute(
        "INSERT INTO api_billing_account (id, partner_id, erstellt_am, aktualisiert_am) \
         VALUES (?1, ?2, ?3, ?3)",
        params![new_id(), partner_id, now],
    )
    .map_err(db_err)?;
    load_account(conn, partner_id)?
        .ok_or_else(|| RechercheError::not_found(format!("billing account for {partner_id}")))
}

struct TransactionRow {
    id: String,
    billing_account_id: String,
    kind: String,
    amount_cents: i64,
    balance_after_cents: i64,
    description: Option<String>,
    reference_kind: Option<String>,
    reference_id: Option<String>,
    actor: String,
    created_at: String,
}

impl TransactionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            billing_account_id: row.get(1)?,
            kind: row.get(2)?,
            amount_cents: row.get(3)?,
            balance_after_cents: row.get(4)?,
            description: row.get(5)?,
            reference_kind: row.get(6)?,
            reference_id: row.get(7)?,
            actor: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

impl TryFrom<TransactionRow> for CreditTransaction {
    type Error = RechercheError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            billing_account_id: row.billing_account_id,
            kind: row.kind.parse()?,
            amount_cents: row.amount_cents,
            balance_after_cents: row.balance_after_cents,
            description: row.description,
            reference: row
                .reference_kind
                .zip(row.reference_id)
                .map(|(kind, id)| TransactionRef { kind, id }),
            actor: row.actor,
            created_at: crate::parse_ts_required(row.created_at)?,
        })
    }
}

impl Store {
    /// The partner's billing account, created with zero balance and default
    /// thresholds on first touch.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn account_for_partner(&self, partner_id: &str) -> Result<BillingAccount, RechercheError> {
        get_or_create_account(&self.conn(), partner_id)
    }

    /// Adjust an account's credit limit (admin/test surface).
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn set_credit_limit(
        &self,
        partner_id: &str,
        credit_limit_cents: i64,
    ) -> Result<(), RechercheError> {
        self.account_for_partner(partner_id)?;
        self.conn()
            .execute(
                "UPDATE api_billing_account SET rechnungs_limit_cents = ?1, \
                 aktualisiert_am = ?2 WHERE partner_id = ?3",
                params![credit_limit_cents, fmt_ts(Utc::now()), partner_id],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Suspend an account; subsequent debits fail.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn suspend_account(&self, partner_id: &str, reason: &str) -> Result<(), RechercheError> {
        self.account_for_partner(partner_id)?;
        self.conn()
            .execute(
                "UPDATE api_billing_account SET ist_gesperrt = 1, gesperrt_grund = ?1, \
                 aktualisiert_am = ?2 WHERE partner_id = ?3",
                params![reason, fmt_ts(Utc::now()), partner_id],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Charge the partner's account. The balance may go negative only down
    /// to the account's credit limit.
    ///
    /// # Errors
    /// `AccountSuspended` when the account is suspended,
    /// `InsufficientFunds` when the debit would exceed the credit limit,
    /// `InvalidArg` for non-positive amounts, `Database` otherwise.
    pub fn debit(
        &self,
        partner_id: &str,
        amount_cents: i64,
        reference: Option<&TransactionRef>,
        actor: &str,
        description: &str,
    ) -> Result<LedgerEntry, RechercheError> {
        self.apply_transaction(
            partner_id,
            TransactionKind::Debit,
            amount_cents,
            reference,
            actor,
            description,
        )
    }

    /// Top up the partner's account. Always allowed.
    ///
    /// # Errors
    /// `InvalidArg` for non-positive amounts, `Database` otherwise.
    pub fn credit(
        &self,
        partner_id: &str,
        amount_cents: i64,
        reference: Option<&TransactionRef>,
        actor: &str,
        description: &str,
    ) -> Result<LedgerEntry, RechercheError> {
        self.apply_transaction(
            partner_id,
            TransactionKind::Credit,
            amount_cents,
            reference,
            actor,
            description,
        )
    }

    /// Reverse an earlier charge. Booked on the credit side under its own
    /// kind so reversals stay visible in the ledger.
    ///
    /// # Errors
    /// `InvalidArg` for non-positive amounts, `Database` otherwise.
    pub fn refund(
        &self,
        partner_id: &str,
        amount_cents: i64,
        reference: Option<&TransactionRef>,
        actor: &str,
        description: &str,
    ) -> Result<LedgerEntry, RechercheError> {
        self.apply_transaction(
            partner_id,
            TransactionKind::Refund,
            amount_cents,
            reference,
            actor,
            description,
        )
    }

    fn apply_transaction(
        &self,
        partner_id: &str,
        kind: TransactionKind,
        amount_cents: i64,
        reference: Option<&TransactionRef>,
        actor: &str,
        description: &str,
    ) -> Result<LedgerEntry, RechercheError> {
        if amount_cents <= 0 {
            return Err(RechercheError::InvalidArg(format!(
                "transaction amount must be positive, got {amount_cents}"
            )));
        }

        let now = Utc::now();
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(db_err)?;

        let account = get_or_create_account(&tx, partner_id)?;
        if kind == TransactionKind::Debit && account.suspended {
            return Err(RechercheError::AccountSuspended {
                reason: account
                    .suspension_reason
                    .unwrap_or_else(|| "no reason recorded".to_string()),
            });
        }

        let new_balance = account.balance_cents + kind.sign() * amount_cents;
        if kind == TransactionKind::Debit && new_balance < -account.credit_limit_cents {
            return Err(RechercheError::InsufficientFunds {
                required_cents: amount_cents,
                available_cents: account.balance_cents,
                credit_limit_cents: account.credit_limit_cents,
            });
        }

        let transaction_id = new_id();
        tx.execute(
            "INSERT INTO api_credit_transaction (id, billing_account_id, typ, betrag_cents, \
             saldo_danach_cents, beschreibung, referenz_typ, referenz_id, erstellt_von, \
             erstellt_am) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                transaction_id,
                account.id,
                kind.as_str(),
                amount_cents,
                new_balance,
                description,
                reference.map(|r| r.kind.as_str()),
                reference.map(|r| r.id.as_str()),
                actor,
                fmt_ts(now),
            ],
        )
        .map_err(db_err)?;

        tx.execute(
            "UPDATE api_billing_account SET guthaben_cents = ?1, aktualisiert_am = ?2 \
             WHERE id = ?3",
            params![new_balance, fmt_ts(now), account.id],
        )
        .map_err(db_err)?;

        // Low-balance warning, at most once per 24 h. Delivery is someone
        // else's concern; the stamp prevents a warning storm.
        if kind == TransactionKind::Debit
            && new_balance < account.warning_threshold_cents
            && account
                .warning_sent_at
                .is_none_or(|sent| now - sent > Duration::hours(24))
        {
            tx.execute(
                "UPDATE api_billing_account SET warnung_gesendet_am = ?1 WHERE id = ?2",
                params![fmt_ts(now), account.id],
            )
            .map_err(db_err)?;
            tracing::warn!(
                partner_id,
                balance_cents = new_balance,
                threshold_cents = account.warning_threshold_cents,
                "credit balance below warning threshold"
            );
        }

        tx.commit().map_err(db_err)?;
        Ok(LedgerEntry {
            balance_cents: new_balance,
            transaction_id,
        })
    }

    /// Ledger rows of an account, oldest first.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn transactions_for_account(
        &self,
        billing_account_id: &str,
    ) -> Result<Vec<CreditTransaction>, RechercheError> {
        self.query_transactions(
            "billing_account_id = ?1",
            params![billing_account_id],
        )
    }

    /// Ledger rows settling a given reference (e.g. one order).
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn transactions_for_reference(
        &self,
        reference: &TransactionRef,
    ) -> Result<Vec<CreditTransaction>, RechercheError> {
        self.query_transactions(
            "referenz_typ = ?1 AND referenz_id = ?2",
            params![reference.kind, reference.id],
        )
    }

    fn query_transactions(
        &self,
        predicate: &str,
        bind: impl rusqlite::Params,
    ) -> Result<Vec<CreditTransaction>, RechercheError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, billing_account_id, typ, betrag_cents, saldo_danach_cents, \
                 beschreibung, referenz_typ, referenz_id, erstellt_von, erstellt_am \
                 FROM api_credit_transaction WHERE {predicate} ORDER BY erstellt_am, id"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(bind, TransactionRow::from_row)
            .map_err(db_err)?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(CreditTransaction::try_from(row.map_err(db_err)?)?);
        }
        Ok(transactions)
    }
}
