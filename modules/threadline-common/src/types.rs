use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A social platform the harvester knows how to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Instagram,
    Facebook,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Twitter, Platform::Instagram, Platform::Facebook];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }

    /// Profile URL for an account handle, as the platform's scraping actor
    /// expects it.
    pub fn profile_url(&self, account: &str) -> String {
        match self {
            Platform::Twitter => format!("https://x.com/{account}"),
            Platform::Instagram => format!("https://www.instagram.com/{account}/"),
            Platform::Facebook => format!("https://www.facebook.com/{account}"),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            other => Err(format!(
                "unknown platform '{other}' (expected twitter, instagram, or facebook)"
            )),
        }
    }
}

/// A scrape target: one account on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub platform: Platform,
    pub account: String,
}

impl Handle {
    pub fn new(platform: Platform, account: impl Into<String>) -> Self {
        Self {
            platform,
            account: account.into(),
        }
    }

    pub fn profile_url(&self) -> String {
        self.platform.profile_url(&self.account)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform, self.account)
    }
}

/// Date window for a posts fetch. Bounds are inclusive and date-granular;
/// the Apify actors accept nothing finer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    pub fn new(since: NaiveDate, until: NaiveDate) -> Self {
        Self { since, until }
    }

    /// The trailing `days`-day window ending today (UTC).
    pub fn last_days(days: i64) -> Self {
        let until = Utc::now().date_naive();
        Self {
            since: until - Duration::days(days),
            until,
        }
    }

    pub fn since_str(&self) -> String {
        self.since.format("%Y-%m-%d").to_string()
    }

    pub fn until_str(&self) -> String {
        self.until.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.since_str(), self.until_str())
    }
}

/// Reference to a post whose comment thread can be fetched. The id is the
/// platform's stable post identifier; the url is what the comment actors
/// take as input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostRef {
    pub id: String,
    pub url: String,
}

impl PostRef {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_through_str() {
        for p in Platform::ALL {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), p);
        }
    }

    #[test]
    fn x_is_an_alias_for_twitter() {
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::Twitter);
    }

    #[test]
    fn unknown_platform_is_rejected() {
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn date_range_formats_day_granular() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(),
        );
        assert_eq!(range.since_str(), "2026-03-01");
        assert_eq!(range.until_str(), "2026-03-08");
    }
}
