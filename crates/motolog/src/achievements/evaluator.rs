//! Achievement evaluation against a data source.

use std::collections::HashSet;

use tracing::{debug, info};

use super::catalog::{AchievementDefinition, CountTarget, Criteria, EventKind, CATALOG};
use crate::error::Result;

/// Aggregates the evaluator needs, plus the unlock sink.
///
/// Implemented by [`crate::storage::Storage`]; tests use in-memory
/// fixtures.
pub trait AchievementContext {
    /// Number of records of `target` owned by the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source cannot be read.
    fn count(&self, user_id: i64, target: CountTarget) -> Result<u64>;

    /// Lifetime distance of one of the user's vehicles, `None` if the
    /// vehicle is not theirs.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source cannot be read.
    fn vehicle_mileage(&self, user_id: i64, motorcycle_id: i64) -> Result<Option<i64>>;

    /// Lifetime distance of every vehicle the user owns.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source cannot be read.
    fn vehicle_mileages(&self, user_id: i64) -> Result<Vec<i64>>;

    /// Codes the user has already unlocked.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source cannot be read.
    fn unlocked_codes(&self, user_id: i64) -> Result<HashSet<String>>;

    /// Record an unlock. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the unlock cannot be written.
    fn unlock(&self, user_id: i64, code: &str) -> Result<bool>;
}

/// Something the user just did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Vehicle involved, for fuel and maintenance events.
    pub motorcycle_id: Option<i64>,
}

impl Event {
    /// An event with no vehicle attached.
    #[must_use]
    pub const fn new(kind: EventKind) -> Self {
        Self {
            kind,
            motorcycle_id: None,
        }
    }

    /// An event on a specific vehicle.
    #[must_use]
    pub const fn on_vehicle(kind: EventKind, motorcycle_id: i64) -> Self {
        Self {
            kind,
            motorcycle_id: Some(motorcycle_id),
        }
    }
}

/// Definitions worth checking after `event`.
fn candidates(event: &Event, unlocked: &HashSet<String>) -> Vec<&'static AchievementDefinition> {
    CATALOG
        .iter()
        .filter(|def| !unlocked.contains(def.code))
        .filter(|def| {
            def.trigger == event.kind
                || (event.kind.moves_odometer()
                    && matches!(def.criteria, Criteria::MileageVehicle { .. }))
        })
        .collect()
}

/// Whether `event` just completed `def`.
///
/// Count criteria match exactly at the threshold so the unlock fires on
/// the record that crosses it.
fn met_by_event<C: AchievementContext + ?Sized>(
    ctx: &C,
    user_id: i64,
    def: &AchievementDefinition,
    event: &Event,
) -> Result<bool> {
    match def.criteria {
        Criteria::First { target } => {
            Ok(def.trigger == event.kind && ctx.count(user_id, target)? == 1)
        }
        Criteria::Count { target, value } => {
            Ok(def.trigger == event.kind && ctx.count(user_id, target)? == value)
        }
        Criteria::VehicleCount { value } => Ok(event.kind == EventKind::AddVehicle
            && ctx.count(user_id, CountTarget::Vehicle)? == value),
        Criteria::MileageVehicle { value_km } => {
            if !event.kind.moves_odometer() {
                return Ok(false);
            }
            let Some(motorcycle_id) = event.motorcycle_id else {
                return Ok(false);
            };
            Ok(ctx
                .vehicle_mileage(user_id, motorcycle_id)?
                .is_some_and(|km| km >= value_km))
        }
    }
}

/// Whether the current state satisfies `def`, regardless of how it got
/// there.
fn met_by_state<C: AchievementContext + ?Sized>(
    ctx: &C,
    user_id: i64,
    def: &AchievementDefinition,
) -> Result<bool> {
    match def.criteria {
        Criteria::First { target } => Ok(ctx.count(user_id, target)? > 0),
        Criteria::Count { target, value } => Ok(ctx.count(user_id, target)? >= value),
        Criteria::VehicleCount { value } => Ok(ctx.count(user_id, CountTarget::Vehicle)? >= value),
        Criteria::MileageVehicle { value_km } => Ok(ctx
            .vehicle_mileages(user_id)?
            .into_iter()
            .any(|km| km >= value_km)),
    }
}

/// Check achievements after `event`, unlocking those it completed.
///
/// Returns the newly unlocked definitions.
///
/// # Errors
///
/// Returns an error if the context cannot be read or written.
pub fn evaluate_event<C: AchievementContext + ?Sized>(
    ctx: &C,
    user_id: i64,
    event: &Event,
) -> Result<Vec<&'static AchievementDefinition>> {
    let unlocked = ctx.unlocked_codes(user_id)?;
    let candidates = candidates(event, &unlocked);
    debug!(
        user_id,
        event = %event.kind,
        candidates = candidates.len(),
        "evaluating achievements"
    );

    let mut newly_unlocked = Vec::new();
    for def in candidates {
        if met_by_event(ctx, user_id, def, event)? && ctx.unlock(user_id, def.code)? {
            info!(user_id, code = def.code, "achievement unlocked");
            newly_unlocked.push(def);
        }
    }
    Ok(newly_unlocked)
}

/// Unlock every achievement the current data already satisfies.
///
/// Used after importing history or when new definitions appear.
///
/// # Errors
///
/// Returns an error if the context cannot be read or written.
pub fn backfill<C: AchievementContext + ?Sized>(
    ctx: &C,
    user_id: i64,
) -> Result<Vec<&'static AchievementDefinition>> {
    let unlocked = ctx.unlocked_codes(user_id)?;
    let mut newly_unlocked = Vec::new();
    for def in CATALOG.iter().filter(|def| !unlocked.contains(def.code)) {
        if met_by_state(ctx, user_id, def)? && ctx.unlock(user_id, def.code)? {
            info!(user_id, code = def.code, "achievement backfilled");
            newly_unlocked.push(def);
        }
    }
    Ok(newly_unlocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Fixture {
        counts: HashMap<CountTarget, u64>,
        mileage: HashMap<i64, i64>,
        unlocked: RefCell<Vec<String>>,
    }

    impl Fixture {
        fn with_count(mut self, target: CountTarget, value: u64) -> Self {
            self.counts.insert(target, value);
            self
        }

        fn with_vehicle(mut self, id: i64, km: i64) -> Self {
            self.mileage.insert(id, km);
            self
        }

        fn codes(&self) -> Vec<String> {
            let mut codes = self.unlocked.borrow().clone();
            codes.sort();
            codes
        }
    }

    impl AchievementContext for Fixture {
        fn count(&self, _user_id: i64, target: CountTarget) -> Result<u64> {
            Ok(self.counts.get(&target).copied().unwrap_or(0))
        }

        fn vehicle_mileage(&self, _user_id: i64, motorcycle_id: i64) -> Result<Option<i64>> {
            Ok(self.mileage.get(&motorcycle_id).copied())
        }

        fn vehicle_mileages(&self, _user_id: i64) -> Result<Vec<i64>> {
            Ok(self.mileage.values().copied().collect())
        }

        fn unlocked_codes(&self, _user_id: i64) -> Result<HashSet<String>> {
            Ok(self.unlocked.borrow().iter().cloned().collect())
        }

        fn unlock(&self, _user_id: i64, code: &str) -> Result<bool> {
            let mut unlocked = self.unlocked.borrow_mut();
            if unlocked.iter().any(|c| c == code) {
                return Ok(false);
            }
            unlocked.push(code.to_string());
            Ok(true)
        }
    }

    #[test]
    fn test_first_vehicle() {
        let ctx = Fixture::default().with_count(CountTarget::Vehicle, 1);
        let unlocked = evaluate_event(&ctx, 1, &Event::new(EventKind::AddVehicle)).unwrap();
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].code, "FIRST_VEHICLE");
    }

    #[test]
    fn test_count_matches_exactly() {
        let ctx = Fixture::default().with_count(CountTarget::FuelEntry, 11);
        let event = Event::on_vehicle(EventKind::AddFuelLog, 1);
        assert!(evaluate_event(&ctx, 1, &event).unwrap().is_empty());

        let ctx = Fixture::default().with_count(CountTarget::FuelEntry, 10);
        let codes: Vec<&str> = evaluate_event(&ctx, 1, &event)
            .unwrap()
            .iter()
            .map(|def| def.code)
            .collect();
        assert_eq!(codes, vec!["FUEL_LOG_COUNT_10"]);
    }

    #[test]
    fn test_event_kind_must_match() {
        // A note event never unlocks fuel achievements even when counts match.
        let ctx = Fixture::default()
            .with_count(CountTarget::FuelEntry, 1)
            .with_count(CountTarget::Note, 5);
        assert!(evaluate_event(&ctx, 1, &Event::new(EventKind::AddNote))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_mileage_on_event_vehicle() {
        let ctx = Fixture::default()
            .with_count(CountTarget::MaintenanceEntry, 2)
            .with_vehicle(1, 500)
            .with_vehicle(2, 12_000);

        let event = Event::on_vehicle(EventKind::AddMaintenanceLog, 1);
        assert!(evaluate_event(&ctx, 1, &event).unwrap().is_empty());

        let event = Event::on_vehicle(EventKind::AddMaintenanceLog, 2);
        let mut codes: Vec<&str> = evaluate_event(&ctx, 1, &event)
            .unwrap()
            .iter()
            .map(|def| def.code)
            .collect();
        codes.sort_unstable();
        assert_eq!(codes, vec!["MILEAGE_VEHICLE_10000KM", "MILEAGE_VEHICLE_1000KM"]);
    }

    #[test]
    fn test_mileage_needs_vehicle() {
        let ctx = Fixture::default().with_vehicle(1, 200_000);
        let event = Event::new(EventKind::AddFuelLog);
        assert!(evaluate_event(&ctx, 1, &event).unwrap().is_empty());
    }

    #[test]
    fn test_already_unlocked_is_skipped() {
        let ctx = Fixture::default().with_count(CountTarget::Vehicle, 1);
        let event = Event::new(EventKind::AddVehicle);
        assert_eq!(evaluate_event(&ctx, 1, &event).unwrap().len(), 1);
        assert!(evaluate_event(&ctx, 1, &event).unwrap().is_empty());
        assert_eq!(ctx.codes(), vec!["FIRST_VEHICLE"]);
    }

    #[test]
    fn test_backfill_uses_at_least() {
        let ctx = Fixture::default()
            .with_count(CountTarget::Vehicle, 4)
            .with_count(CountTarget::FuelEntry, 60)
            .with_count(CountTarget::OdoReset, 1)
            .with_vehicle(1, 300)
            .with_vehicle(2, 15_000);

        backfill(&ctx, 1).unwrap();
        assert_eq!(
            ctx.codes(),
            vec![
                "FIRST_FUEL_LOG",
                "FIRST_ODO_RESET",
                "FIRST_VEHICLE",
                "FUEL_LOG_COUNT_10",
                "FUEL_LOG_COUNT_50",
                "MILEAGE_VEHICLE_10000KM",
                "MILEAGE_VEHICLE_1000KM",
                "VEHICLE_COUNT_3",
            ]
        );

        // Second run finds nothing new.
        assert!(backfill(&ctx, 1).unwrap().is_empty());
    }
}
