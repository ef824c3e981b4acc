//! Static session-close table keyed by asset classification.
//!
//! Resolution order, applied by [`session_policy`]:
//!
//! 1. A rule with a forced timezone uses that zone and its single close.
//! 2. Otherwise the instrument timezone's entry in the per-zone table.
//! 3. Otherwise the rule's default close, in the instrument timezone.
//!
//! Unrecognized classifications use the equity rule. Unrecognized timezone
//! names resolve to [`DEFAULT_TIMEZONE`].

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::AssetClassification;

/// Zone used when an instrument timezone name cannot be resolved.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Local wall-clock time after which the day's bar is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionClose {
    pub hour: u32,
    pub minute: u32,
}

impl SessionClose {
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    pub fn as_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketRule {
    /// Close depends on the exchange the instrument lists on.
    ExchangeLocal {
        closes: &'static [(&'static str, SessionClose)],
        default_close: SessionClose,
    },
    /// Same zone and close for every instrument of the class.
    ForcedTimezone { timezone: Tz, close: SessionClose },
}

const EXCHANGE_CLOSES: &[(&str, SessionClose)] = &[
    ("America/New_York", SessionClose::new(16, 0)),
    ("America/Chicago", SessionClose::new(15, 0)),
    ("Europe/London", SessionClose::new(16, 30)),
    ("Europe/Berlin", SessionClose::new(17, 30)),
    ("Europe/Paris", SessionClose::new(17, 30)),
    ("Asia/Tokyo", SessionClose::new(15, 30)),
    ("Asia/Hong_Kong", SessionClose::new(16, 0)),
    ("Australia/Sydney", SessionClose::new(16, 0)),
];

static EQUITY_RULE: MarketRule = MarketRule::ExchangeLocal {
    closes: EXCHANGE_CLOSES,
    default_close: SessionClose::new(16, 0),
};

static FUTURE_RULE: MarketRule = MarketRule::ForcedTimezone {
    timezone: chrono_tz::America::Chicago,
    close: SessionClose::new(16, 0),
};

static CURRENCY_RULE: MarketRule = MarketRule::ForcedTimezone {
    timezone: chrono_tz::America::New_York,
    close: SessionClose::new(17, 0),
};

static CONTINUOUS_RULE: MarketRule = MarketRule::ForcedTimezone {
    timezone: Tz::UTC,
    close: SessionClose::new(23, 59),
};

/// Rule for a classification, and whether the equity fallback was used.
pub fn rule_for(classification: &AssetClassification) -> (&'static MarketRule, bool) {
    match classification {
        AssetClassification::Equity | AssetClassification::Etf | AssetClassification::Index => {
            (&EQUITY_RULE, false)
        }
        AssetClassification::Future => (&FUTURE_RULE, false),
        AssetClassification::Currency => (&CURRENCY_RULE, false),
        AssetClassification::Continuous => (&CONTINUOUS_RULE, false),
        AssetClassification::Other(_) => (&EQUITY_RULE, true),
    }
}

/// Timezone and session close selected for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub timezone: Tz,
    pub close: SessionClose,
    pub used_fallback_rule: bool,
    pub used_fallback_timezone: bool,
}

pub fn session_policy(
    classification: &AssetClassification,
    instrument_timezone: &str,
) -> SessionPolicy {
    let (rule, used_fallback_rule) = rule_for(classification);
    if used_fallback_rule {
        warn!(
            classification = %classification,
            "unknown asset classification, falling back to EQUITY rules"
        );
    }

    match rule {
        MarketRule::ForcedTimezone { timezone, close } => SessionPolicy {
            timezone: *timezone,
            close: *close,
            used_fallback_rule,
            used_fallback_timezone: false,
        },
        MarketRule::ExchangeLocal {
            closes,
            default_close,
        } => {
            let close = match closes.iter().find(|(zone, _)| *zone == instrument_timezone) {
                Some((_, close)) => {
                    debug!(timezone = instrument_timezone, ?close, "using exchange close override");
                    *close
                }
                None => {
                    debug!(timezone = instrument_timezone, close = ?default_close, "using default close");
                    *default_close
                }
            };
            let (timezone, used_fallback_timezone) = match instrument_timezone.parse::<Tz>() {
                Ok(timezone) => (timezone, false),
                Err(_) => {
                    warn!(
                        timezone = instrument_timezone,
                        fallback = DEFAULT_TIMEZONE.name(),
                        "unknown timezone, using fallback"
                    );
                    (DEFAULT_TIMEZONE, true)
                }
            };

            SessionPolicy {
                timezone,
                close,
                used_fallback_rule,
                used_fallback_timezone,
            }
        }
    }
}
