use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Asset classification attached to an instrument for the lifetime of a run.
///
/// Provider tags are matched case-insensitively. Tags outside the known set
/// are kept verbatim in [`AssetClassification::Other`] so the rule table can
/// report the fallback it applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetClassification {
    Equity,
    Etf,
    Index,
    Future,
    Currency,
    /// Traded around the clock with no session gaps (crypto).
    Continuous,
    Other(String),
}

impl AssetClassification {
    pub fn parse(input: &str) -> Self {
        let normalized = input.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "EQUITY" | "STOCK" => Self::Equity,
            "ETF" => Self::Etf,
            "INDEX" => Self::Index,
            "FUTURE" | "FUTURES" => Self::Future,
            "CURRENCY" | "FOREX" | "FX" => Self::Currency,
            "CONTINUOUS" | "CRYPTOCURRENCY" | "CRYPTO" => Self::Continuous,
            _ => Self::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Equity => "EQUITY",
            Self::Etf => "ETF",
            Self::Index => "INDEX",
            Self::Future => "FUTURE",
            Self::Currency => "CURRENCY",
            Self::Continuous => "CONTINUOUS",
            Self::Other(value) => value,
        }
    }

    pub const fn trades_continuously(&self) -> bool {
        matches!(self, Self::Continuous)
    }
}

impl Display for AssetClassification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for AssetClassification {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for AssetClassification {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<AssetClassification> for String {
    fn from(value: AssetClassification) -> Self {
        value.as_str().to_string()
    }
}
