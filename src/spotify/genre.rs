//! Genre keywords, request limits and the dashboard's market catalogue.

use std::fmt;
use std::str::FromStr;

/// Upper bound Spotify accepts for `limit`.
pub const MAX_LIMIT: u32 = 50;

/// Market used when the caller does not pick one.
pub const DEFAULT_MARKET: &str = "US";

/// The two genres the dashboard compares.
pub const DASHBOARD_GENRES: [&str; 2] = ["techno", "psytrance"];

/// Search keywords for a genre. Unknown genres are searched verbatim.
pub fn search_keywords(genre: &str) -> String {
    match genre.to_lowercase().as_str() {
        "techno" => "techno melodicTechno".to_string(),
        "psytrance" => "psytrance psytrance".to_string(),
        "trance" => "trance".to_string(),
        "house" => "house".to_string(),
        "progressive" => "progressive house".to_string(),
        _ => genre.to_string(),
    }
}

/// Clamp to `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_LIMIT)
}

/// Countries offered by the dashboard, each bound to a Spotify market.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Country {
    Global,
    Brazil,
    Germany,
    Mexico,
}

impl Country {
    pub const ALL: [Country; 4] = [
        Country::Global,
        Country::Brazil,
        Country::Germany,
        Country::Mexico,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Country::Global => "GLOBAL",
            Country::Brazil => "BR",
            Country::Germany => "DE",
            Country::Mexico => "MX",
        }
    }

    /// Spotify market queried for this country. Global falls back to the US catalogue.
    pub fn market(self) -> &'static str {
        match self {
            Country::Global => DEFAULT_MARKET,
            Country::Brazil => "BR",
            Country::Germany => "DE",
            Country::Mexico => "MX",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Country::Global => "Global",
            Country::Brazil => "Brasil",
            Country::Germany => "Alemania",
            Country::Mexico => "México",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Country {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Country::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown country '{}'", s))
    }
}
