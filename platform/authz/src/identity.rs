use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    geo::GeoScope,
    permission::{PermissionSet, compute_permissions},
    role::Role,
};

/// The authenticated account as seen by authorization checks.
///
/// Built per call from the authoritative account record; never persisted on
/// its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
    pub level: Level,
    pub designation: Option<Designation>,
    pub geo: GeoScope,
    pub permissions: PermissionSet,
    /// Cross-cutting regions used by feature code; not evaluated here.
    pub assigned_regions: Vec<String>,
}

impl Identity {
    /// An identity with the default permission grants for `role` and no geo
    /// scope.
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            level: Level::default(),
            designation: None,
            geo: GeoScope::default(),
            permissions: compute_permissions(role),
            assigned_regions: Vec::new(),
        }
    }

    pub fn with_geo(mut self, geo: GeoScope) -> Self {
        self.geo = geo;
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_designation(mut self, designation: Designation) -> Self {
        self.designation = Some(designation);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("level {0} outside 1..=12")]
pub struct LevelOutOfRange(pub i64);

/// Secondary seniority marker. Carried through credentials, not consulted by
/// any decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Level(u8);

impl Level {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 12;

    pub fn new(value: i64) -> Result<Self, LevelOutOfRange> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Level)
            .ok_or(LevelOutOfRange(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Level(Self::MIN)
    }
}

impl TryFrom<i64> for Level {
    type Error = LevelOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Level::new(value)
    }
}

impl From<Level> for i64 {
    fn from(value: Level) -> Self {
        i64::from(value.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown designation `{0}`")]
pub struct UnknownDesignation(pub String);

macro_rules! designations {
    ($($variant:ident => $tag:literal,)+) => {
        /// Job function. Display and audit only.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Designation {
            $(#[serde(rename = $tag)] $variant,)+
        }

        impl Designation {
            pub const ALL: &'static [Designation] = &[$(Designation::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Designation::$variant => $tag,)+
                }
            }
        }
    };
}

designations! {
    BoardOfDirector => "board-of-director",
    ExecutiveDirector => "executive-director",
    OperationsDirector => "operations-director",
    CharteredAccountant => "chartered-accountant",
    Auditor => "auditor",
    TechnicalConsultant => "technical-consultant",
    Advisor => "advisor",
    CountryOfficer => "country-officer",
    SeniorProgramManager => "senior-program-manager",
    SeniorManager => "senior-manager",
    SeniorOfficer => "senior-officer",
    Manager => "manager",
    Officer => "officer",
    Associate => "associate",
    Executive => "executive",
    Intern => "intern",
    WebDeveloper => "web-developer",
    Assistant => "assistant",
    DataEntryOperator => "data-entry-operator",
    Receptionist => "receptionist",
    EventOrganizer => "event-organizer",
    DevelopmentDoer => "development-doer",
    OfficeAttendant => "office-attendant",
    Driver => "driver",
    Guard => "guard",
    Vendor => "vendor",
    DailyServiceProvider => "daily-service-provider",
    StateProgramManager => "state-program-manager",
    StateCoordinator => "state-coordinator",
    StateOfficer => "state-officer",
    RegionalProgramManager => "regional-program-manager",
    RegionalCoordinator => "regional-coordinator",
    RegionalOfficer => "regional-officer",
    DistrictProgramManager => "district-program-manager",
    DistrictCoordinator => "district-coordinator",
    DistrictExecutive => "district-executive",
    Counsellor => "counsellor",
    ClusterCoordinator => "cluster-coordinator",
    Volunteer => "volunteer",
    FieldCoordinator => "field-coordinator",
}

impl fmt::Display for Designation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Designation {
    type Err = UnknownDesignation;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Designation::ALL
            .iter()
            .copied()
            .find(|designation| designation.as_str() == value)
            .ok_or_else(|| UnknownDesignation(value.to_string()))
    }
}
