// Data structures shared across the pipeline, the remote API client and the pages

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalizer::{non_negative, positive};

/// Canonical rental listing, produced only by `normalizer::normalize`.
///
/// Records are never edited in place: an edit or an availability toggle builds
/// a new record (`with_update`) that replaces the old one by `id`.
///
/// Serializes with camelCase keys plus an `available` flag, which the
/// normalizer accepts back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub id: String,
    pub title: Option<String>,
    pub city: String,
    pub state: String,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub zip_code: Option<String>,
    pub unit_label: Option<String>,
    /// Monthly rent. `None` when the payload carried no usable value.
    pub rent: Option<f64>,
    #[serde(rename = "beds")]
    pub bedrooms: Option<f64>,
    #[serde(rename = "baths")]
    pub bathrooms: Option<f64>,
    pub sqft: Option<f64>,
    /// True when the listing can currently be rented.
    pub available: bool,
    pub landlord_name: Option<String>,
    pub landlord_email: Option<String>,
    pub landlord_phone: Option<String>,
    pub avg_rating: Option<f64>,
    pub city_avg_rent: Option<f64>,
    /// Rent as a percentage of the city average, sent by the best-deals query.
    pub rent_pct_of_city_avg: Option<f64>,
    /// Payload fields neither naming convention models, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListingRecord {
    /// Address line 1 when known, else "City, ST".
    pub fn heading(&self) -> String {
        match &self.address_line1 {
            Some(line) => line.clone(),
            None => format!("{}, {}", self.city, self.state),
        }
    }

    pub fn rent_label(&self) -> String {
        match self.rent {
            Some(rent) => format!("${}", format_number(rent)),
            None => "$?".to_string(),
        }
    }

    /// Short bedroom label used on result cards.
    pub fn beds_label(&self) -> String {
        match self.bedrooms {
            Some(beds) if beds == 0.0 => "Studio".to_string(),
            Some(beds) => format!("{} bed", format_number(beds)),
            None => "? bed".to_string(),
        }
    }

    /// Long bedroom label used on the detail page.
    pub fn beds_detail(&self) -> String {
        match self.bedrooms {
            Some(beds) if beds == 0.0 => "Studio".to_string(),
            Some(beds) if beds == 1.0 => "1 bedroom".to_string(),
            Some(beds) => format!("{} bedrooms", format_number(beds)),
            None => "Unknown".to_string(),
        }
    }

    pub fn baths_label(&self) -> String {
        self.bathrooms.map(format_number).unwrap_or_else(|| "?".to_string())
    }

    pub fn sqft_label(&self) -> Option<String> {
        self.sqft.map(format_number)
    }

    pub fn rating_label(&self) -> String {
        format!("{:.1} / 5", self.avg_rating.unwrap_or(0.0))
    }

    /// Hint shown for best-deal results; absent (or zero) percentages show nothing.
    pub fn deal_hint(&self) -> Option<String> {
        match self.rent_pct_of_city_avg {
            Some(pct) if pct != 0.0 => Some(format!(
                "This property is ~{:.0}% less than average rent in {}",
                100.0 - pct,
                self.city
            )),
            _ => None,
        }
    }

    /// One-line address for management tables.
    pub fn address_summary(&self) -> String {
        let mut out = String::new();
        if let Some(unit) = &self.unit_label {
            out.push_str(unit);
            out.push_str(", ");
        }
        if let Some(street) = &self.address_line1 {
            out.push_str(street);
            out.push_str(", ");
        }
        out.push_str(&format!("{}, {}", self.city, self.state));
        if let Some(zip) = &self.zip_code {
            out.push(' ');
            out.push_str(zip);
        }
        out
    }

    /// Builds the record that replaces this one after a successful update.
    pub fn with_update(&self, update: &PropertyUpdate) -> ListingRecord {
        let mut next = self.clone();
        if let Some(label) = &update.unit_label {
            let label = label.trim();
            next.unit_label = if label.is_empty() { None } else { Some(label.to_string()) };
        }
        // Same value rules as the normalizer, so a reload shows what was stored here.
        if let Some(rent) = update.rent_cost {
            next.rent = non_negative(rent);
        }
        if let Some(beds) = update.bedrooms {
            next.bedrooms = non_negative(beds);
        }
        if let Some(baths) = update.bathrooms {
            next.bathrooms = positive(baths);
        }
        if let Some(sqft) = update.sqft {
            next.sqft = positive(sqft);
        }
        if let Some(cannot_rent) = update.can_rent {
            next.available = !cannot_rent;
        }
        next
    }

    /// Canonical JSON form; feeding it back through the normalizer yields an equal record.
    #[cfg(test)]
    pub fn to_raw(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Renders 1200.0 as "1200" and 1.5 as "1.5".
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// User-chosen search filters. Unset fields place no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub city: Option<String>,
    pub min_rent: Option<f64>,
    pub max_rent: Option<f64>,
    pub min_beds: Option<f64>,
    pub min_baths: Option<f64>,
    #[serde(default)]
    pub available_only: bool,
}

impl FilterCriteria {
    /// Trims the city and drops it when blank.
    pub fn cleaned(mut self) -> Self {
        self.city = self
            .city
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == FilterCriteria::default()
    }

    /// Request body for `POST /api/properties`.
    pub fn search_body(&self) -> SearchBody {
        SearchBody {
            city: self.city.clone(),
            min_rent: self.min_rent,
            max_rent: self.max_rent,
            min_beds: self.min_beds,
            min_baths: self.min_baths,
        }
    }

    /// The part of the criteria the remote search cannot express.
    pub fn local_only(&self) -> FilterCriteria {
        FilterCriteria {
            available_only: self.available_only,
            ..FilterCriteria::default()
        }
    }
}

/// Body of `POST /api/properties`. Every key is sent, `null` meaning "no filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub city: Option<String>,
    pub min_rent: Option<f64>,
    pub max_rent: Option<f64>,
    pub min_beds: Option<f64>,
    pub min_baths: Option<f64>,
}

/// Body of `POST /api/properties/deals`; a `null` city means all cities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealsBody {
    pub city: Option<String>,
}

/// Partial update for `PUT /api/manage-properties/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqft: Option<f64>,
    /// Stored flag: `true` means the unit cannot be rented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_rent: Option<bool>,
}

impl PropertyUpdate {
    pub fn availability(available: bool) -> Self {
        PropertyUpdate {
            can_rent: Some(!available),
            ..PropertyUpdate::default()
        }
    }
}

/// Body of `POST /api/listing/{id}/review`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewBody {
    pub stars: f64,
    pub comments: Option<String>,
}

/// Logged-in user as reported by `GET /api/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: i64,
    pub username: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Gender codes as the remote stores them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "X")]
    Other,
    #[default]
    #[serde(rename = "?")]
    Unspecified,
}

impl Gender {
    pub const ALL: [Gender; 4] = [Gender::Male, Gender::Female, Gender::Other, Gender::Unspecified];

    pub fn code(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "X",
            Gender::Unspecified => "?",
        }
    }

    pub fn from_code(code: &str) -> Option<Gender> {
        Gender::ALL.into_iter().find(|g| g.code() == code.trim())
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
            Gender::Unspecified => "Prefer not to say",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    #[default]
    Renter,
    Landlord,
}

impl UserType {
    pub fn parse(value: &str) -> Option<UserType> {
        match value.trim() {
            "Renter" => Some(UserType::Renter),
            "Landlord" => Some(UserType::Landlord),
            _ => None,
        }
    }
}

/// Body of `POST /api/signup`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupBody {
    pub email: String,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub phone_number: String,
    /// Sent as `YYYY-MM-DD`.
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub user_type: UserType,
}

/// A unit a landlord lists, sent to `POST /api/properties` with its address.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    pub street: String,
    pub city: String,
    pub state_code: String,
    pub zip_code: String,
    pub unit_label: Option<String>,
    pub rent_cost: f64,
    pub sqft: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    /// Stored flag: `true` means the unit cannot be rented.
    pub can_rent: bool,
}

/// Account details behind the settings page, read by `normalizer::normalize_settings`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountSettings {
    /// "Renter" or "Landlord"; renters also have matching preferences.
    pub role: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub display_name: String,
    pub distance_max: Option<f64>,
    pub gender_preferred: Gender,
}

impl AccountSettings {
    pub fn is_renter(&self) -> bool {
        self.role.as_deref() == Some("Renter")
    }
}

/// Body of `PUT /api/settings`. Renter preferences are only sent for renters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub email: String,
    pub phone_number: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender_preferred: Option<Gender>,
}

/// Loading lifecycle of a remotely fetched collection.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Idle,
    Loading,
    Ready(T),
    Error(String),
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            LoadState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use serde_json::json;

    #[test]
    fn labels_follow_listing_page_wording() {
        let studio = normalize(&json!({"id": 1, "city": "Bangor", "state": "ME", "rent": 900, "beds": 0, "baths": 1.5}));
        assert_eq!(studio.beds_label(), "Studio");
        assert_eq!(studio.beds_detail(), "Studio");
        assert_eq!(studio.baths_label(), "1.5");
        assert_eq!(studio.rent_label(), "$900");
        assert_eq!(studio.heading(), "Bangor, ME");
        assert_eq!(studio.rating_label(), "0.0 / 5");

        let unknown = normalize(&json!({"id": 2}));
        assert_eq!(unknown.beds_label(), "? bed");
        assert_eq!(unknown.beds_detail(), "Unknown");
        assert_eq!(unknown.baths_label(), "?");
    }

    #[test]
    fn deal_hint_only_for_nonzero_percentage() {
        let deal = normalize(&json!({"id": 1, "city": "Portland", "rentPctOfCityAvg": 82}));
        assert_eq!(
            deal.deal_hint().as_deref(),
            Some("This property is ~18% less than average rent in Portland")
        );
        let plain = normalize(&json!({"id": 2, "city": "Portland"}));
        assert_eq!(plain.deal_hint(), None);
    }

    #[test]
    fn with_update_builds_replacement_record() {
        let original = normalize(&json!({"PROPERTY_ID": 7, "CITY": "Portland", "RENT_COST": 1000, "CAN_RENT": 0}));
        let toggled = original.with_update(&PropertyUpdate::availability(false));
        assert!(original.available);
        assert!(!toggled.available);
        assert_eq!(toggled.id, original.id);

        let edited = original.with_update(&PropertyUpdate {
            unit_label: Some("Apt 2".into()),
            rent_cost: Some(1100.0),
            ..PropertyUpdate::default()
        });
        assert_eq!(edited.unit_label.as_deref(), Some("Apt 2"));
        assert_eq!(edited.rent, Some(1100.0));
        assert_eq!(original.rent, Some(1000.0));
    }

    #[test]
    fn with_update_agrees_with_normalizer_on_reload() {
        let original = normalize(&json!({"PROPERTY_ID": 9, "CITY": "Austin", "BATHROOMS": 1, "SQFT": 700}));
        let edited = original.with_update(&PropertyUpdate {
            unit_label: Some("  Unit B  ".into()),
            bathrooms: Some(0.0),
            sqft: Some(-5.0),
            bedrooms: Some(-1.0),
            ..PropertyUpdate::default()
        });
        assert_eq!(edited.unit_label.as_deref(), Some("Unit B"));
        assert_eq!(edited.bathrooms, None);
        assert_eq!(edited.sqft, None);
        assert_eq!(edited.bedrooms, None);
        assert_eq!(normalize(&edited.to_raw()), edited);
    }

    #[test]
    fn search_body_sends_nulls_for_unset_filters() {
        let criteria = FilterCriteria {
            city: Some("Portland".into()),
            max_rent: Some(1500.0),
            available_only: true,
            ..FilterCriteria::default()
        };
        let body = serde_json::to_value(criteria.search_body()).unwrap();
        assert_eq!(
            body,
            json!({"city": "Portland", "minRent": null, "maxRent": 1500.0, "minBeds": null, "minBaths": null})
        );
    }

    #[test]
    fn availability_update_sends_inverted_flag() {
        let body = serde_json::to_value(PropertyUpdate::availability(true)).unwrap();
        assert_eq!(body, json!({"canRent": false}));
    }

    #[test]
    fn signup_body_uses_remote_codes() {
        let body = SignupBody {
            email: "ashley@example.com".into(),
            username: "ashley".into(),
            password: "pw".into(),
            display_name: "Ashley".into(),
            phone_number: "207-555-0101".into(),
            birth_date: NaiveDate::from_ymd_opt(1999, 4, 2).unwrap(),
            gender: Gender::Unspecified,
            user_type: UserType::Landlord,
        };
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["birthDate"], "1999-04-02");
        assert_eq!(value["gender"], "?");
        assert_eq!(value["userType"], "Landlord");
        assert_eq!(value["displayName"], "Ashley");
    }

    #[test]
    fn renter_preferences_are_optional_in_settings_update() {
        let landlord = SettingsUpdate { email: "a@example.com".into(), ..SettingsUpdate::default() };
        let body = serde_json::to_value(landlord).unwrap();
        assert_eq!(body, json!({"email": "a@example.com", "phoneNumber": "", "displayName": ""}));

        let renter = SettingsUpdate { distance_max: Some(15.0), gender_preferred: Some(Gender::Female), ..SettingsUpdate::default() };
        let body = serde_json::to_value(renter).unwrap();
        assert_eq!(body["distanceMax"], 15.0);
        assert_eq!(body["genderPreferred"], "F");
        assert_eq!(Gender::from_code(" X "), Some(Gender::Other));
        assert_eq!(Gender::from_code("Z"), None);
    }

    #[test]
    fn cleaned_drops_blank_city() {
        let criteria = FilterCriteria { city: Some("   ".into()), ..FilterCriteria::default() }.cleaned();
        assert!(criteria.is_empty());
    }
}
