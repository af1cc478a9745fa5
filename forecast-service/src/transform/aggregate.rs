use std::collections::BTreeMap;

use demand_client::domain::{SessionRecord, StationDayAggregate, StationLocation};
use time::Date;

/// Collapses sessions into one row per (station, calendar day).
///
/// Sessions are visited in stable timestamp order, so the location kept for a
/// row is the one of its earliest session. Output is ordered by
/// (station_id, day); days without sessions produce no row.
pub fn aggregate_sessions(records: &[SessionRecord]) -> Vec<StationDayAggregate> {
    let mut ordered: Vec<&SessionRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.ts);

    let mut groups: BTreeMap<(&str, Date), StationDayAggregate> = BTreeMap::new();
    for rec in ordered {
        groups
            .entry((rec.station_id.as_str(), rec.day()))
            .and_modify(|agg| {
                agg.energy_sum += rec.energy_kwh;
                agg.duration_sum += rec.duration_min;
            })
            .or_insert_with(|| StationDayAggregate {
                station_id: rec.station_id.clone(),
                day: rec.day(),
                energy_sum: rec.energy_kwh,
                duration_sum: rec.duration_min,
                latitude: rec.latitude,
                longitude: rec.longitude,
            });
    }

    groups.into_values().collect()
}

/// First-seen location of every station, i.e. the location of its earliest
/// aggregate row.
pub fn station_locations(aggregates: &[StationDayAggregate]) -> BTreeMap<String, StationLocation> {
    let mut out: BTreeMap<String, (Date, StationLocation)> = BTreeMap::new();
    for agg in aggregates {
        match out.get(&agg.station_id) {
            Some((day, _)) if *day <= agg.day => {}
            _ => {
                out.insert(agg.station_id.clone(), (agg.day, agg.location()));
            }
        }
    }
    out.into_iter().map(|(id, (_, loc))| (id, loc)).collect()
}
