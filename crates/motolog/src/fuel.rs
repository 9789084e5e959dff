//! Fuel economy calculations.
//!
//! Economy is only defined between two full-tank entries: the fuel added
//! after the earlier fill up to and including the later one is what the
//! bike burned over that distance.

use std::collections::HashMap;

use crate::model::FuelEntry;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// km/L over a distance and volume, `None` unless both are positive.
#[must_use]
pub fn economy(distance_km: i64, fuel_litres: f64) -> Option<f64> {
    if distance_km <= 0 || fuel_litres.is_nan() || fuel_litres <= 0.0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let kpl = distance_km as f64 / fuel_litres;
    kpl.is_finite().then(|| round2(kpl))
}

/// km/L for every entry, keyed by entry id.
///
/// Entries may span several vehicles and arrive in any order; each vehicle
/// is walked in ascending total distance. Only a full-tank entry that
/// follows another full-tank entry gets a value. Volume from entries
/// flagged `exclude_from_average` is not counted.
#[must_use]
pub fn kpl_bulk(entries: &[FuelEntry]) -> HashMap<i64, Option<f64>> {
    let mut ordered: Vec<&FuelEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| (entry.motorcycle_id, entry.total_distance, entry.id));

    let mut kpl_map = HashMap::with_capacity(entries.len());
    let mut current_vehicle = None;
    let mut last_full: Option<&FuelEntry> = None;
    let mut accumulated = 0.0;

    for entry in ordered {
        if current_vehicle != Some(entry.motorcycle_id) {
            current_vehicle = Some(entry.motorcycle_id);
            last_full = None;
            accumulated = 0.0;
        }

        if !entry.exclude_from_average {
            accumulated += entry.fuel_volume;
        }

        if entry.is_full_tank {
            let kpl = last_full
                .and_then(|prev| economy(entry.total_distance - prev.total_distance, accumulated));
            kpl_map.insert(entry.id, kpl);
            last_full = Some(entry);
            accumulated = 0.0;
        } else {
            kpl_map.insert(entry.id, None);
        }
    }

    kpl_map
}

/// km/L for a single entry given its vehicle's history.
#[must_use]
pub fn kpl_for_entry(entries: &[FuelEntry], entry_id: i64) -> Option<f64> {
    let vehicle = entries.iter().find(|e| e.id == entry_id)?.motorcycle_id;
    let history: Vec<FuelEntry> = entries
        .iter()
        .filter(|e| e.motorcycle_id == vehicle)
        .cloned()
        .collect();
    kpl_bulk(&history).get(&entry_id).copied().flatten()
}

/// Vehicle-wide average km/L.
///
/// Walks consecutive full-tank pairs, skipping a pair when either end is
/// excluded from the average. Racers have no economy.
#[must_use]
pub fn average_kpl(entries: &[FuelEntry], is_racer: bool) -> Option<f64> {
    if is_racer {
        return None;
    }

    let mut full_tanks: Vec<&FuelEntry> = entries.iter().filter(|e| e.is_full_tank).collect();
    if full_tanks.len() < 2 {
        return None;
    }
    full_tanks.sort_by_key(|e| (e.total_distance, e.id));

    let mut total_distance = 0;
    let mut total_fuel = 0.0;
    for pair in full_tanks.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if start.exclude_from_average || end.exclude_from_average {
            continue;
        }

        let distance = end.total_distance - start.total_distance;
        let fuel: f64 = entries
            .iter()
            .filter(|e| {
                !e.exclude_from_average
                    && e.total_distance > start.total_distance
                    && e.total_distance <= end.total_distance
            })
            .map(|e| e.fuel_volume)
            .sum();

        if distance > 0 && fuel > 0.0 {
            total_distance += distance;
            total_fuel += fuel;
        }
    }

    economy(total_distance, total_fuel)
}

/// Final cost of a fuel-up in whole currency units.
///
/// An entered amount wins and is rounded; otherwise price times volume.
#[must_use]
pub fn resolve_total_cost(
    entered: Option<f64>,
    price_per_liter: Option<f64>,
    fuel_volume: f64,
) -> Option<i64> {
    #[allow(clippy::cast_possible_truncation)]
    let to_units = |value: f64| value.is_finite().then(|| value.round() as i64);

    match (entered, price_per_liter) {
        (Some(cost), _) => to_units(cost),
        (None, Some(price)) => to_units(price * fuel_volume),
        (None, None) => None,
    }
}
