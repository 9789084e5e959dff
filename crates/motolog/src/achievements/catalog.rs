//! The fixed set of achievements.

use serde::Serialize;

/// Kind of user action that can unlock achievements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A vehicle was registered.
    AddVehicle,
    /// A fuel entry was recorded.
    AddFuelLog,
    /// A maintenance entry was recorded.
    AddMaintenanceLog,
    /// A note was written.
    AddNote,
    /// An odometer reset was recorded.
    AddOdoReset,
}

impl EventKind {
    /// Events after which vehicle mileage may have grown.
    #[must_use]
    pub const fn moves_odometer(self) -> bool {
        matches!(self, Self::AddFuelLog | Self::AddMaintenanceLog)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AddVehicle => "add_vehicle",
            Self::AddFuelLog => "add_fuel_log",
            Self::AddMaintenanceLog => "add_maintenance_log",
            Self::AddNote => "add_note",
            Self::AddOdoReset => "add_odo_reset",
        };
        f.write_str(name)
    }
}

/// Records counted by count-based criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountTarget {
    /// Registered vehicles.
    Vehicle,
    /// Fuel entries across all vehicles.
    FuelEntry,
    /// Maintenance entries across all vehicles.
    MaintenanceEntry,
    /// General notes.
    Note,
    /// Odometer resets across all vehicles.
    OdoReset,
}

/// Unlock condition of an achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criteria {
    /// The first record of a kind.
    First {
        /// What is counted.
        target: CountTarget,
    },
    /// A number of records of a kind.
    Count {
        /// What is counted.
        target: CountTarget,
        /// Threshold.
        value: u64,
    },
    /// A number of registered vehicles.
    VehicleCount {
        /// Threshold.
        value: u64,
    },
    /// Lifetime distance reached on any single vehicle.
    MileageVehicle {
        /// Threshold in km.
        value_km: i64,
    },
}

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementDefinition {
    /// Stable identifier stored with unlocks.
    pub code: &'static str,
    /// Short title.
    pub name: &'static str,
    /// What the rider did.
    pub description: &'static str,
    /// Event that triggers evaluation.
    pub trigger: EventKind,
    /// Unlock condition.
    pub criteria: Criteria,
}

const fn first(
    code: &'static str,
    name: &'static str,
    description: &'static str,
    trigger: EventKind,
    target: CountTarget,
) -> AchievementDefinition {
    AchievementDefinition {
        code,
        name,
        description,
        trigger,
        criteria: Criteria::First { target },
    }
}

const fn count(
    code: &'static str,
    name: &'static str,
    description: &'static str,
    trigger: EventKind,
    target: CountTarget,
    value: u64,
) -> AchievementDefinition {
    AchievementDefinition {
        code,
        name,
        description,
        trigger,
        criteria: Criteria::Count { target, value },
    }
}

const fn mileage(
    code: &'static str,
    name: &'static str,
    description: &'static str,
    value_km: i64,
) -> AchievementDefinition {
    AchievementDefinition {
        code,
        name,
        description,
        trigger: EventKind::AddFuelLog,
        criteria: Criteria::MileageVehicle { value_km },
    }
}

const fn vehicles(
    code: &'static str,
    name: &'static str,
    description: &'static str,
    value: u64,
) -> AchievementDefinition {
    AchievementDefinition {
        code,
        name,
        description,
        trigger: EventKind::AddVehicle,
        criteria: Criteria::VehicleCount { value },
    }
}

use CountTarget as T;
use EventKind as E;

/// Every achievement, in display order.
pub const CATALOG: &[AchievementDefinition] = &[
    first("FIRST_VEHICLE", "New partner", "Register your first vehicle", E::AddVehicle, T::Vehicle),
    first("FIRST_FUEL_LOG", "First fill-up", "Record your first fuel entry", E::AddFuelLog, T::FuelEntry),
    first(
        "FIRST_MAINT_LOG",
        "First wrench",
        "Record your first maintenance entry",
        E::AddMaintenanceLog,
        T::MaintenanceEntry,
    ),
    first("FIRST_NOTE", "Note taker", "Write your first note", E::AddNote, T::Note),
    first(
        "FIRST_ODO_RESET",
        "Back to zero",
        "Record your first odometer reset",
        E::AddOdoReset,
        T::OdoReset,
    ),
    count("FUEL_LOG_COUNT_10", "Regular at the pump", "Record 10 fuel entries", E::AddFuelLog, T::FuelEntry, 10),
    count("FUEL_LOG_COUNT_50", "Fuel tracker", "Record 50 fuel entries", E::AddFuelLog, T::FuelEntry, 50),
    count("FUEL_LOG_COUNT_100", "Fuel master", "Record 100 fuel entries", E::AddFuelLog, T::FuelEntry, 100),
    count(
        "MAINT_LOG_COUNT_10",
        "Weekend mechanic",
        "Record 10 maintenance entries",
        E::AddMaintenanceLog,
        T::MaintenanceEntry,
        10,
    ),
    count(
        "MAINT_LOG_COUNT_50",
        "Garage regular",
        "Record 50 maintenance entries",
        E::AddMaintenanceLog,
        T::MaintenanceEntry,
        50,
    ),
    count(
        "MAINT_LOG_COUNT_100",
        "Master mechanic",
        "Record 100 maintenance entries",
        E::AddMaintenanceLog,
        T::MaintenanceEntry,
        100,
    ),
    count("NOTE_COUNT_10", "Diarist", "Write 10 notes", E::AddNote, T::Note, 10),
    count("NOTE_COUNT_50", "Chronicler", "Write 50 notes", E::AddNote, T::Note, 50),
    count("NOTE_COUNT_100", "Archivist", "Write 100 notes", E::AddNote, T::Note, 100),
    mileage("MILEAGE_VEHICLE_1000KM", "1,000 km together", "Reach 1,000 km on one vehicle", 1_000),
    mileage("MILEAGE_VEHICLE_10000KM", "10,000 km together", "Reach 10,000 km on one vehicle", 10_000),
    mileage("MILEAGE_VEHICLE_100000KM", "100,000 km together", "Reach 100,000 km on one vehicle", 100_000),
    vehicles("VEHICLE_COUNT_3", "Collector", "Register 3 vehicles", 3),
    vehicles("VEHICLE_COUNT_5", "Motorhead", "Register 5 vehicles", 5),
    vehicles("VEHICLE_COUNT_10", "Garage king", "Register 10 vehicles", 10),
];

/// Look up a definition by code.
#[must_use]
pub fn find(code: &str) -> Option<&'static AchievementDefinition> {
    CATALOG.iter().find(|def| def.code == code)
}
