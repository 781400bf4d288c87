//! Geographic scope.
//!
//! Scope breadth is the first populated field scanning inward from
//! `country`. A broader scope satisfies any narrower requirement.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown geo level `{0}`")]
pub struct UnknownGeoLevel(pub String);

/// Administrative level, broadest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoLevel {
    Country,
    State,
    Region,
    District,
    Block,
    Area,
}

impl GeoLevel {
    pub const ORDER: [GeoLevel; 6] = [
        GeoLevel::Country,
        GeoLevel::State,
        GeoLevel::Region,
        GeoLevel::District,
        GeoLevel::Block,
        GeoLevel::Area,
    ];

    /// 0 for `country` through 5 for `area`.
    pub fn index(self) -> usize {
        match self {
            GeoLevel::Country => 0,
            GeoLevel::State => 1,
            GeoLevel::Region => 2,
            GeoLevel::District => 3,
            GeoLevel::Block => 4,
            GeoLevel::Area => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GeoLevel::Country => "country",
            GeoLevel::State => "state",
            GeoLevel::Region => "region",
            GeoLevel::District => "district",
            GeoLevel::Block => "block",
            GeoLevel::Area => "area",
        }
    }

    /// Whether a scope rooted at `self` covers a requirement at `required`.
    pub fn covers(self, required: GeoLevel) -> bool {
        self.index() <= required.index()
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoLevel {
    type Err = UnknownGeoLevel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        GeoLevel::ORDER
            .into_iter()
            .find(|level| level.as_str() == value)
            .ok_or_else(|| UnknownGeoLevel(value.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
}

impl GeoScope {
    pub fn country(value: impl Into<String>) -> Self {
        Self::default().with(GeoLevel::Country, value)
    }

    pub fn with(mut self, level: GeoLevel, value: impl Into<String>) -> Self {
        *self.slot_mut(level) = Some(value.into());
        self
    }

    /// Populated value at `level`. Blank strings count as unset.
    pub fn get(&self, level: GeoLevel) -> Option<&str> {
        let slot = match level {
            GeoLevel::Country => &self.country,
            GeoLevel::State => &self.state,
            GeoLevel::Region => &self.region,
            GeoLevel::District => &self.district,
            GeoLevel::Block => &self.block,
            GeoLevel::Area => &self.area,
        };
        slot.as_deref().filter(|value| !value.trim().is_empty())
    }

    fn slot_mut(&mut self, level: GeoLevel) -> &mut Option<String> {
        match level {
            GeoLevel::Country => &mut self.country,
            GeoLevel::State => &mut self.state,
            GeoLevel::Region => &mut self.region,
            GeoLevel::District => &mut self.district,
            GeoLevel::Block => &mut self.block,
            GeoLevel::Area => &mut self.area,
        }
    }

    /// Breadth of this scope: the first populated level from `country`
    /// inward. Gaps further in are ignored. `None` means no geographic access.
    pub fn depth(&self) -> Option<GeoLevel> {
        GeoLevel::ORDER
            .into_iter()
            .find(|level| self.get(*level).is_some())
    }
}

pub fn has_geo_access(identity: &Identity, required: GeoLevel) -> bool {
    if identity.role.is_universal() {
        return true;
    }
    identity
        .geo
        .depth()
        .is_some_and(|depth| depth.covers(required))
}
