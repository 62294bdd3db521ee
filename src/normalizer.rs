// Field normalizer: the only place raw backend payloads are inspected.
//
// The backend emits the same listing in two key conventions: camelCase from
// the search endpoints (`rent`, `beds`, `canRent`) and upper snake case from
// the management endpoints (`RENT_COST`, `BEDROOMS`, `CAN_RENT`). Each field
// is resolved camelCase first, upper case second, then a fixed default.

use serde_json::{Map, Value};

use crate::models::{AccountSettings, Gender, ListingRecord, format_number};

pub const UNKNOWN_CITY: &str = "Unknown city";
pub const UNKNOWN_STATE: &str = "??";

const ID: &[&str] = &["id", "PROPERTY_ID"];
const TITLE: &[&str] = &["title"];
const CITY: &[&str] = &["city", "CITY"];
const STATE: &[&str] = &["state", "STATE_CODE"];
const ADDRESS_LINE1: &[&str] = &["addressLine1", "ADDRESS_LINE1", "STREET"];
const ADDRESS_LINE2: &[&str] = &["addressLine2", "ADDRESS_LINE2"];
const ZIP_CODE: &[&str] = &["zipCode", "zip", "ZIP_CODE", "ZIPCODE"];
const UNIT_LABEL: &[&str] = &["unitLabel", "UNIT_LABEL"];
const RENT: &[&str] = &["rent", "RENT_COST"];
const BEDROOMS: &[&str] = &["beds", "BEDROOMS"];
const BATHROOMS: &[&str] = &["baths", "BATHROOMS"];
const SQFT: &[&str] = &["sqft", "SQFT"];
const LANDLORD_NAME: &[&str] = &["landlordName", "LANDLORD_NAME"];
const LANDLORD_EMAIL: &[&str] = &["landlordEmail", "LANDLORD_EMAIL"];
const LANDLORD_PHONE: &[&str] = &["landlordPhone", "LANDLORD_PHONE"];
const AVG_RATING: &[&str] = &["avgRating", "AVG_RATING"];
const CITY_AVG_RENT: &[&str] = &["cityAvgRent", "city_avg_rent", "CITY_AVG_RENT"];
const RENT_PCT: &[&str] = &["rentPctOfCityAvg", "rent_pct_of_city_avg", "RENT_PCT_OF_CITY_AVG"];

/// Canonical availability key written by `ListingRecord` serialization.
const AVAILABLE: &str = "available";
const CAN_RENT: &[&str] = &["canRent", "CAN_RENT"];

const MODELED: &[&[&str]] = &[
    ID, TITLE, CITY, STATE, ADDRESS_LINE1, ADDRESS_LINE2, ZIP_CODE, UNIT_LABEL, RENT, BEDROOMS,
    BATHROOMS, SQFT, LANDLORD_NAME, LANDLORD_EMAIL, LANDLORD_PHONE, AVG_RATING, CITY_AVG_RENT,
    RENT_PCT, CAN_RENT, &[AVAILABLE],
];

/// Maps any raw listing payload onto a `ListingRecord`. Never fails: missing
/// or unusable values fall back to the documented defaults.
pub fn normalize(raw: &Value) -> ListingRecord {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    ListingRecord {
        id: pick(obj, ID).and_then(as_text).unwrap_or_default(),
        title: text(obj, TITLE),
        city: text(obj, CITY).unwrap_or_else(|| UNKNOWN_CITY.to_string()),
        state: text(obj, STATE).unwrap_or_else(|| UNKNOWN_STATE.to_string()),
        address_line1: text(obj, ADDRESS_LINE1),
        address_line2: text(obj, ADDRESS_LINE2),
        zip_code: text(obj, ZIP_CODE),
        unit_label: text(obj, UNIT_LABEL),
        rent: number(obj, RENT).and_then(non_negative),
        bedrooms: number(obj, BEDROOMS).and_then(non_negative),
        bathrooms: number(obj, BATHROOMS).and_then(positive),
        sqft: number(obj, SQFT).and_then(positive),
        available: availability(obj),
        landlord_name: text(obj, LANDLORD_NAME),
        landlord_email: text(obj, LANDLORD_EMAIL),
        landlord_phone: text(obj, LANDLORD_PHONE),
        avg_rating: number(obj, AVG_RATING).map(|r| r.clamp(0.0, 5.0)),
        city_avg_rent: number(obj, CITY_AVG_RENT),
        rent_pct_of_city_avg: number(obj, RENT_PCT),
        extra: obj
            .iter()
            .filter(|(key, _)| !MODELED.iter().any(|keys| keys.contains(&key.as_str())))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}

/// Reads `GET /api/settings`: `{role, user: {EMAIL, ...}, renterSettings: {DISTANCE_MAX, ...}}`.
/// Missing sections leave their fields blank; renter preferences are only
/// read for renters.
pub fn normalize_settings(raw: &Value) -> AccountSettings {
    let empty = Map::new();
    let user = raw.get("user").and_then(Value::as_object).unwrap_or(&empty);
    let renter = raw.get("renterSettings").and_then(Value::as_object).unwrap_or(&empty);

    let mut settings = AccountSettings {
        role: raw.get("role").and_then(as_text).filter(|r| !r.is_empty()),
        email: text(user, &["EMAIL", "email"]).unwrap_or_default(),
        phone_number: text(user, &["PHONE_NUMBER", "phoneNumber"]).unwrap_or_default(),
        display_name: text(user, &["DISPLAY_NAME", "displayName"]).unwrap_or_default(),
        ..AccountSettings::default()
    };
    if settings.is_renter() {
        settings.distance_max = number(renter, &["DISTANCE_MAX", "distanceMax"]).and_then(non_negative);
        settings.gender_preferred = text(renter, &["GENDER_PREFERRED", "genderPreferred"])
            .and_then(|code| Gender::from_code(&code))
            .unwrap_or_default();
    }
    settings
}

/// Id of a newly created property from the create response.
pub fn created_property_id(raw: &Value) -> Option<String> {
    let obj = raw.as_object()?;
    pick(obj, &["propertyId", "PROPERTY_ID", "id"])
        .and_then(as_text)
        .filter(|id| !id.is_empty())
}

/// Rent and bedroom counts may be zero; negatives are treated as unknown.
pub fn non_negative(value: f64) -> Option<f64> {
    (value >= 0.0).then_some(value)
}

/// Bathrooms and square footage must be strictly positive to be shown.
pub fn positive(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}

/// Decodes the stored "cannot rent" flag into display availability:
///
/// - `false` / `0` → available, `true` / nonzero → not available
/// - `null` or absent → available, so unverified scraped listings stay visible
/// - anything else → not available
pub fn decode_availability(flag: Option<&Value>) -> bool {
    match flag {
        None | Some(Value::Null) => true,
        Some(Value::Bool(cannot_rent)) => !cannot_rent,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

fn availability(obj: &Map<String, Value>) -> bool {
    if let Some(Value::Bool(available)) = obj.get(AVAILABLE) {
        return *available;
    }
    // Presence decides the convention here, not nullness: `canRent: null`
    // wins over a populated `CAN_RENT`.
    let flag = if obj.contains_key(CAN_RENT[0]) {
        obj.get(CAN_RENT[0])
    } else {
        obj.get(CAN_RENT[1])
    };
    decode_availability(flag)
}

/// First non-null value among `keys`, in order.
fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    pick(obj, keys).and_then(as_text).filter(|s| !s.is_empty())
}

fn number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    pick(obj, keys).and_then(as_number)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Some(i.to_string()),
            (_, Some(u), _) => Some(u.to_string()),
            (_, _, Some(f)) => Some(format_number(f)),
            _ => None,
        },
        _ => None,
    }
}

// MySQL DECIMAL columns arrive as JSON strings, so numeric text is accepted.
fn as_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}
