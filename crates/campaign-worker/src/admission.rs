//! Admission filters applied to injected subscriber numbers.

use chrono::{DateTime, Utc};

use campaign_core::config::jobs::JobsConfig;
use campaign_core::result::AppResult;
use campaign_database::store::ChargeLedger;

/// Why a line from an injection file was not accepted as an MSISDN.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Too long msisdn, length: {0}")]
    TooLong(usize),
    #[error("Too short msisdn, length: {0}")]
    TooShort(usize),
    #[error("Wrong prefix: {0}")]
    WrongPrefix(String),
    #[error("Not a number: {0}")]
    NotNumeric(String),
}

/// Why a valid subscriber is not charged again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlreadyCharged {
    /// A successful charge was sent after the given instant.
    Since(DateTime<Utc>),
    /// A successful charge exists at all.
    Ever,
}

impl std::fmt::Display for AlreadyCharged {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Since(at) => write!(f, "paid after {}", at.to_rfc3339()),
            Self::Ever => write!(f, "paid before"),
        }
    }
}

/// Length band and prefix an MSISDN must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRules {
    pub check_prefix: String,
    pub min_len: usize,
    pub max_len: usize,
}

impl AdmissionRules {
    pub fn from_config(config: &JobsConfig) -> Self {
        Self {
            check_prefix: config.check_prefix.clone(),
            min_len: config.min_msisdn_length,
            max_len: config.max_msisdn_length,
        }
    }

    /// Normalize a raw line and check it. Returns the MSISDN on success.
    pub fn check(&self, raw: &str) -> Result<String, Rejection> {
        let msisdn = normalize(raw);
        if !msisdn.chars().all(|c| c.is_ascii_digit()) {
            return Err(Rejection::NotNumeric(msisdn.to_string()));
        }
        let len = msisdn.chars().count();
        if len > self.max_len {
            return Err(Rejection::TooLong(len));
        }
        if len < self.min_len {
            return Err(Rejection::TooShort(len));
        }
        if !msisdn.starts_with(&self.check_prefix) {
            return Err(Rejection::WrongPrefix(msisdn.to_string()));
        }
        Ok(msisdn.to_string())
    }
}

/// Strip leading and trailing non-digit characters.
pub fn normalize(raw: &str) -> &str {
    raw.trim_matches(|c: char| !c.is_ascii_digit())
}

/// Apply the optional ledger filters. `last_charge_at` is checked first.
pub async fn ledger_guard(
    ledger: &dyn ChargeLedger,
    msisdn: &str,
    last_charge_at: Option<DateTime<Utc>>,
    never: bool,
) -> AppResult<Option<AlreadyCharged>> {
    if let Some(since) = last_charge_at {
        if ledger.has_paid_since(msisdn, since).await? {
            return Ok(Some(AlreadyCharged::Since(since)));
        }
    }
    if never && ledger.has_ever_paid(msisdn).await? {
        return Ok(Some(AlreadyCharged::Ever));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_database::memory::MemoryLedger;
    use chrono::Duration;

    fn rules() -> AdmissionRules {
        AdmissionRules::from_config(&JobsConfig::default())
    }

    #[test]
    fn test_normalize_trims_non_digits() {
        assert_eq!(normalize("  +923001234567\r"), "923001234567");
        assert_eq!(normalize("\"9230-01\";"), "9230-01");
        assert_eq!(normalize("abc"), "");
    }

    #[test]
    fn test_length_band_and_prefix() {
        let rules = rules();
        assert_eq!(rules.check("9230000001"), Ok("9230000001".to_string()));
        assert_eq!(rules.check("9230"), Err(Rejection::TooShort(4)));
        assert_eq!(rules.check(""), Err(Rejection::TooShort(0)));
        assert_eq!(
            rules.check("923000000000000000001"),
            Err(Rejection::TooLong(21))
        );
        assert_eq!(
            rules.check("8830000001"),
            Err(Rejection::WrongPrefix("8830000001".to_string()))
        );
        assert_eq!(rules.check("92300"), Ok("92300".to_string()));
    }

    #[test]
    fn test_inner_garbage_is_rejected() {
        let rules = rules();
        assert_eq!(
            rules.check("92300\u{FFFD}00002"),
            Err(Rejection::NotNumeric("92300\u{FFFD}00002".to_string()))
        );
        assert_eq!(
            rules.check(" 9230-000-0001 "),
            Err(Rejection::NotNumeric("9230-000-0001".to_string()))
        );
    }

    #[tokio::test]
    async fn test_ledger_guard() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        ledger.record("92301", "paid", now - Duration::days(1));
        ledger.record("92302", "expired_paid", now - Duration::days(100));

        let week_ago = Some(now - Duration::days(7));
        assert_eq!(
            ledger_guard(&ledger, "92301", week_ago, false).await.unwrap(),
            Some(AlreadyCharged::Since(now - Duration::days(7)))
        );
        assert_eq!(ledger_guard(&ledger, "92302", week_ago, false).await.unwrap(), None);
        assert_eq!(
            ledger_guard(&ledger, "92302", None, true).await.unwrap(),
            Some(AlreadyCharged::Ever)
        );
        assert_eq!(ledger_guard(&ledger, "92303", week_ago, true).await.unwrap(), None);
    }
}
