use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown ttl '{0}'; expected one of: hour, day, week, two weeks")]
pub struct TtlError(pub String);

/// Lifetimes a sender may pick. Closed set; there is no default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ttl {
    Hour,
    Day,
    Week,
    TwoWeeks,
}

impl Ttl {
    pub const ALL: [Ttl; 4] = [Ttl::Hour, Ttl::Day, Ttl::Week, Ttl::TwoWeeks];

    #[must_use]
    pub const fn as_secs(self) -> u64 {
        match self {
            Ttl::Hour => 3_600,
            Ttl::Day => 86_400,
            Ttl::Week => 604_800,
            Ttl::TwoWeeks => 1_209_600,
        }
    }

    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Ttl::Hour => "hour",
            Ttl::Day => "day",
            Ttl::Week => "week",
            Ttl::TwoWeeks => "two weeks",
        }
    }
}

impl FromStr for Ttl {
    type Err = TtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ttl::ALL
            .into_iter()
            .find(|ttl| ttl.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TtlError(s.to_string()))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
