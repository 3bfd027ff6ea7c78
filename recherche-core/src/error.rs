use thiserror::Error;

/// Unified error type for the recherche workspace.
///
/// Covers provider-tagged failures, tier and argument validation, credit
/// settlement outcomes, rate limiting, and persistence errors. Dispositions
/// (skip provider, fail order, reject request) are decided by the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RechercheError {
    /// An order references a quality tier that does not exist.
    #[error("unknown quality tier: {tier}")]
    UnknownTier {
        /// The offending tier string as stored on the order.
        tier: String,
    },

    /// No registered provider can serve the requested tier.
    #[error("no provider available for tier '{tier}' (required: {required:?})")]
    NoProviderAvailable {
        /// Tier that was requested.
        tier: String,
        /// Provider names the tier is configured to use.
        required: Vec<String>,
    },

    /// An individual provider call failed (HTTP error, bad payload, ...).
    #[error("{provider} failed: {msg}")]
    Provider {
        /// Provider name that failed.
        provider: String,
        /// Human-readable error message.
        msg: String,
    },

    /// An individual provider call exceeded the configured timeout.
    #[error("provider timed out: {provider}")]
    ProviderTimeout {
        /// Provider name that timed out.
        provider: String,
    },

    /// A partner exhausted one of its fixed rate-limit windows.
    #[error("rate limit exceeded: limit={limit} window={window} retry_after={retry_after_seconds}s")]
    RateLimited {
        /// Allowed number of calls in the window.
        limit: u32,
        /// Window name ("minute", "hour", "day").
        window: &'static str,
        /// Seconds until the window resets; always positive.
        retry_after_seconds: u64,
        /// Epoch second at which the window resets.
        reset_epoch: i64,
    },

    /// A debit would push the balance past the account's credit limit.
    #[error(
        "insufficient funds: required={required_cents}ct available={available_cents}ct limit={credit_limit_cents}ct"
    )]
    InsufficientFunds {
        /// Amount the debit asked for.
        required_cents: i64,
        /// Balance before the attempted debit.
        available_cents: i64,
        /// How far below zero the balance may go.
        credit_limit_cents: i64,
    },

    /// The billing account is suspended; no debits are accepted.
    #[error("billing account suspended: {reason}")]
    AccountSuspended {
        /// Suspension reason recorded on the account.
        reason: String,
    },

    /// A monetary amount does not scale to whole cents.
    #[error("invalid money amount: {0}")]
    InvalidMoney(String),

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A referenced entity could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing entity, e.g. "partner 1a2b...".
        what: String,
    },

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),

    /// Issues with returned or expected data (missing fields, bad JSON, ...).
    #[error("data issue: {0}")]
    Data(String),
}

impl RechercheError {
    /// Helper: build an `UnknownTier` error from the stored tier string.
    pub fn unknown_tier(tier: impl Into<String>) -> Self {
        Self::UnknownTier { tier: tier.into() }
    }

    /// Helper: build a `Provider` error with the provider name and message.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `ProviderTimeout` error.
    pub fn provider_timeout(provider: impl Into<String>) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing entity.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `Database` error from any displayable source.
    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    /// Helper: build a `Data` error from any displayable source.
    pub fn data(err: impl std::fmt::Display) -> Self {
        Self::Data(err.to_string())
    }

    /// Whether this error is terminal for the order that produced it.
    ///
    /// Provider failures and timeouts are recovered locally by skipping the
    /// provider; everything else fails the current lease.
    #[must_use]
    pub const fn is_provider_local(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::ProviderTimeout { .. })
    }
}
