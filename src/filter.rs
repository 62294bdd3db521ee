// Filter evaluator over canonical records
// Every predicate is independent; an unset criterion always passes.

use crate::models::{FilterCriteria, ListingRecord};

/// True when `record` satisfies every criterion that is set.
///
/// Bounds are inclusive. A record whose rent/beds/baths is unknown fails any
/// bound placed on that field, the same way a SQL `NULL` comparison does on
/// the remote side.
pub fn matches(record: &ListingRecord, criteria: &FilterCriteria) -> bool {
    city_matches(record, criteria.city.as_deref())
        && at_least(record.rent, criteria.min_rent)
        && at_most(record.rent, criteria.max_rent)
        && at_least(record.bedrooms, criteria.min_beds)
        && at_least(record.bathrooms, criteria.min_baths)
        && (!criteria.available_only || record.available)
}

/// Keeps the matching records, preserving order.
pub fn apply(records: Vec<ListingRecord>, criteria: &FilterCriteria) -> Vec<ListingRecord> {
    if criteria.is_empty() {
        return records;
    }
    records.into_iter().filter(|r| matches(r, criteria)).collect()
}

fn city_matches(record: &ListingRecord, city: Option<&str>) -> bool {
    match city.map(str::trim) {
        None | Some("") => true,
        Some(needle) => record.city.to_lowercase().contains(&needle.to_lowercase()),
    }
}

fn at_least(value: Option<f64>, bound: Option<f64>) -> bool {
    match bound {
        None => true,
        Some(min) => value.is_some_and(|v| v >= min),
    }
}

fn at_most(value: Option<f64>, bound: Option<f64>) -> bool {
    match bound {
        None => true,
        Some(max) => value.is_some_and(|v| v <= max),
    }
}
