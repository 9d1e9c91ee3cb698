use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use http::Method;
use serde::{Deserialize, Serialize};

use crate::config::schedule::DatasetEndpoint;

/// The fixed set of upstream datasets kept in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dataset {
    WaitTimes,
    ShowTimes,
    PointsOfInterest,
    Seasons,
    OpeningTimes,
}

/// Refresh loop a dataset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Fast,
    Slow,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::WaitTimes,
        Dataset::ShowTimes,
        Dataset::PointsOfInterest,
        Dataset::Seasons,
        Dataset::OpeningTimes,
    ];

    /// Cache key, also used as the storage row key.
    pub fn key(&self) -> &'static str {
        match self {
            Dataset::WaitTimes => "wait-times",
            Dataset::ShowTimes => "show-times",
            Dataset::PointsOfInterest => "points-of-interest",
            Dataset::Seasons => "seasons",
            Dataset::OpeningTimes => "opening-times",
        }
    }

    pub fn cadence(&self) -> Cadence {
        match self {
            Dataset::WaitTimes | Dataset::ShowTimes => Cadence::Fast,
            Dataset::PointsOfInterest | Dataset::Seasons | Dataset::OpeningTimes => Cadence::Slow,
        }
    }

    pub fn with_cadence(cadence: Cadence) -> Vec<Dataset> {
        Dataset::ALL.into_iter().filter(|d| d.cadence() == cadence).collect()
    }

    /// Built-in upstream endpoint, used when the config has no override.
    pub fn default_endpoint(&self) -> DatasetEndpoint {
        let (path, live_only) = match self {
            Dataset::WaitTimes => ("/api/v2/waiting-times", false),
            Dataset::ShowTimes => ("/api/v2/show-times", true),
            Dataset::PointsOfInterest => ("/api/v2/poi-group", true),
            Dataset::Seasons => ("/api/v2/seasons", true),
            Dataset::OpeningTimes => ("/api/v2/season-opentime-details/europapark", false),
        };
        let mut params = BTreeMap::new();
        if live_only {
            params.insert("status".to_owned(), "live".to_owned());
        }
        DatasetEndpoint { path: path.to_owned(), method: Method::GET, params }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Dataset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.key() == s)
            .ok_or_else(|| anyhow!("unknown dataset '{}'", s))
    }
}
