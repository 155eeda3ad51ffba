//! Typed job parameters parsed from the `params` JSON column.

use campaign_core::AppError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::JobKind;

/// Sort direction of the expired-retry query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Parameters of an injection job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionParams {
    /// Service charged for every injected subscriber.
    pub service_code: String,
    /// Campaign override; falls back to the catalog default.
    pub campaign_id: Option<String>,
    /// Skip subscribers that were ever charged successfully.
    pub never: bool,
    /// Skip subscribers charged successfully after this instant.
    pub last_charge_at: Option<DateTime<Utc>>,
    /// Maximum number of records considered in one run.
    pub count: Option<u64>,
    /// Log decisions without publishing.
    pub dry_run: bool,
}

/// Parameters of an expired-retry job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiredParams {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub service_code: Option<String>,
    pub campaign_id: Option<String>,
    pub never: bool,
    pub last_charge_at: Option<DateTime<Utc>>,
    /// Maximum number of rows loaded.
    pub count: Option<u64>,
    /// Which row per subscriber survives `DISTINCT ON`.
    pub order: SortOrder,
    pub dry_run: bool,
}

/// Parameters of a job, resolved according to its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobParams {
    Injection(InjectionParams),
    Expired(ExpiredParams),
}

/// Flat on-disk representation shared by both job kinds.
#[derive(Debug, Default, Deserialize)]
struct RawParams {
    #[serde(default)]
    date_from: Option<String>,
    #[serde(default)]
    date_to: Option<String>,
    #[serde(default)]
    service_code: Option<Scalar>,
    #[serde(default)]
    campaign_id: Option<Scalar>,
    #[serde(default)]
    never: Option<Flag>,
    #[serde(default)]
    last_charge_at: Option<String>,
    #[serde(default)]
    count: Option<Scalar>,
    #[serde(default)]
    order: Option<String>,
    #[serde(default)]
    dry_run: Option<Flag>,
}

/// Identifiers are written both as strings and as numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(i64),
}

impl Scalar {
    fn into_non_empty(self) -> Option<String> {
        match self {
            Self::Text(s) if s.trim().is_empty() => None,
            Self::Text(s) => Some(s.trim().to_string()),
            Self::Number(n) => Some(n.to_string()),
        }
    }
}

/// Flags are written as booleans, 0/1 integers or their string forms.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n > 0,
            Self::Text(s) => {
                let s = s.trim();
                s.eq_ignore_ascii_case("true") || s.parse::<i64>().is_ok_and(|n| n > 0)
            }
        }
    }
}

impl JobParams {
    /// Parse the raw `params` text of a job of the given kind.
    ///
    /// An empty string is treated as `{}`.
    pub fn parse(kind: JobKind, raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        let parsed: RawParams = if raw.is_empty() {
            RawParams::default()
        } else {
            serde_json::from_str(raw).map_err(|e| {
                AppError::validation(format!("{kind} params: malformed JSON: {e}"))
            })?
        };

        let count = match parsed.count {
            None => None,
            Some(Scalar::Number(n)) => Some(n),
            Some(Scalar::Text(s)) if s.trim().is_empty() => None,
            Some(Scalar::Text(s)) => Some(s.trim().parse::<i64>().map_err(|_| {
                AppError::validation(format!("{kind} params: count must be an integer, got '{s}'"))
            })?),
        };
        let count = match count {
            Some(n) if n < 0 => {
                return Err(AppError::validation(format!(
                    "{kind} params: count must not be negative, got {n}"
                )));
            }
            Some(0) | None => None,
            Some(n) => Some(n as u64),
        };
        let last_charge_at = optional_timestamp(kind, "last_charge_at", parsed.last_charge_at)?;
        let never = parsed.never.as_ref().is_some_and(Flag::is_set);
        let dry_run = parsed.dry_run.as_ref().is_some_and(Flag::is_set);
        let service_code = parsed.service_code.and_then(Scalar::into_non_empty);
        let campaign_id = parsed.campaign_id.and_then(Scalar::into_non_empty);

        match kind {
            JobKind::Injection => {
                let service_code = service_code.ok_or_else(|| {
                    AppError::validation(format!("{kind} params: service_code is required"))
                })?;
                Ok(Self::Injection(InjectionParams {
                    service_code,
                    campaign_id,
                    never,
                    last_charge_at,
                    count,
                    dry_run,
                }))
            }
            JobKind::Expired => {
                let order = match parsed.order.as_deref().map(str::trim) {
                    None | Some("") => SortOrder::Asc,
                    Some(o) if o.eq_ignore_ascii_case("asc") => SortOrder::Asc,
                    Some(o) if o.eq_ignore_ascii_case("desc") => SortOrder::Desc,
                    Some(o) => {
                        return Err(AppError::validation(format!(
                            "{kind} params: order must be 'asc' or 'desc', got '{o}'"
                        )));
                    }
                };
                Ok(Self::Expired(ExpiredParams {
                    date_from: optional_timestamp(kind, "date_from", parsed.date_from)?,
                    date_to: optional_timestamp(kind, "date_to", parsed.date_to)?,
                    service_code,
                    campaign_id,
                    never,
                    last_charge_at,
                    count,
                    order,
                    dry_run,
                }))
            }
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Self::Injection(_) => JobKind::Injection,
            Self::Expired(_) => JobKind::Expired,
        }
    }

    pub fn dry_run(&self) -> bool {
        match self {
            Self::Injection(p) => p.dry_run,
            Self::Expired(p) => p.dry_run,
        }
    }

    /// Record limit for one run, if any.
    pub fn count(&self) -> Option<u64> {
        match self {
            Self::Injection(p) => p.count,
            Self::Expired(p) => p.count,
        }
    }
}

fn optional_timestamp(
    kind: JobKind,
    field: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_timestamp(s).map(Some).ok_or_else(|| {
            AppError::validation(format!("{kind} params: invalid {field} timestamp '{s}'"))
        }),
    }
}

/// Parse a timestamp written as RFC 3339, `YYYY-MM-DD HH:MM:SS` or
/// `YYYY-MM-DD`. Naive forms are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
