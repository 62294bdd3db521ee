// Browser form payloads and their validation

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    error::AppError,
    models::{
        AccountSettings, FilterCriteria, Gender, ListingRecord, NewProperty, PropertyUpdate, ReviewBody,
        SettingsUpdate, SignupBody, UserType, format_number,
    },
};

/// Filter bar of the properties page. Everything arrives as text and a
/// blank field places no constraint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterForm {
    pub city: String,
    pub min_rent: String,
    pub max_rent: String,
    pub min_beds: String,
    pub min_baths: String,
    /// Checkbox; present only when ticked.
    pub available_only: Option<String>,
}

impl FilterForm {
    /// Prefills the form from the criteria currently in effect.
    pub fn from_criteria(criteria: &FilterCriteria) -> Self {
        let show = |value: Option<f64>| value.map(format_number).unwrap_or_default();
        FilterForm {
            city: criteria.city.clone().unwrap_or_default(),
            min_rent: show(criteria.min_rent),
            max_rent: show(criteria.max_rent),
            min_beds: show(criteria.min_beds),
            min_baths: show(criteria.min_baths),
            available_only: criteria.available_only.then(|| "on".to_string()),
        }
    }

    pub fn is_available_only(&self) -> bool {
        self.available_only.is_some()
    }

    pub fn criteria(&self) -> Result<FilterCriteria, AppError> {
        let criteria = FilterCriteria {
            city: Some(self.city.clone()),
            min_rent: parse_bound("Min rent", &self.min_rent)?,
            max_rent: parse_bound("Max rent", &self.max_rent)?,
            min_beds: parse_bound("Min beds", &self.min_beds)?,
            min_baths: parse_bound("Min baths", &self.min_baths)?,
            available_only: self.is_available_only(),
        };
        Ok(criteria.cleaned())
    }
}

/// Same checks as the form, for criteria posted as JSON.
pub fn validate_criteria(criteria: &FilterCriteria) -> Result<(), AppError> {
    let bounds = [
        ("Min rent", criteria.min_rent),
        ("Max rent", criteria.max_rent),
        ("Min beds", criteria.min_beds),
        ("Min baths", criteria.min_baths),
    ];
    for (label, value) in bounds {
        if let Some(value) = value {
            check_bound(label, value)?;
        }
    }
    Ok(())
}

fn parse_bound(label: &str, input: &str) -> Result<Option<f64>, AppError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let value = input
        .parse::<f64>()
        .map_err(|_| AppError::BadRequest(format!("{} must be a number", label)))?;
    check_bound(label, value)?;
    Ok(Some(value))
}

/// Blank stays unset; anything entered must be strictly positive.
fn parse_positive(label: &str, input: &str) -> Result<Option<f64>, AppError> {
    match parse_bound(label, input)? {
        Some(value) if value <= 0.0 => Err(AppError::BadRequest(format!("{} must be more than zero", label))),
        value => Ok(value),
    }
}

fn check_bound(label: &str, value: f64) -> Result<(), AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::BadRequest(format!("{} must be zero or more", label)));
    }
    Ok(())
}

/// "Find me deals" posts the whole filter bar; only the city matters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DealsForm {
    pub city: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewForm {
    pub stars: String,
    pub comments: String,
}

impl ReviewForm {
    pub fn body(&self) -> Result<ReviewBody, AppError> {
        let stars = self
            .stars
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::BadRequest("Stars must be a number".to_string()))?;
        if !(1.0..=5.0).contains(&stars) {
            return Err(AppError::BadRequest("Stars must be between 1 and 5".to_string()));
        }
        let comments = self.comments.trim();
        Ok(ReviewBody {
            stars,
            comments: (!comments.is_empty()).then(|| comments.to_string()),
        })
    }
}

/// Edit row of the management table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EditForm {
    pub unit_label: String,
    pub rent_cost: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub sqft: String,
    pub available: Option<String>,
}

impl EditForm {
    pub fn from_record(record: &ListingRecord) -> Self {
        let show = |value: Option<f64>| value.map(format_number).unwrap_or_default();
        EditForm {
            unit_label: record.unit_label.clone().unwrap_or_default(),
            rent_cost: show(record.rent),
            bedrooms: show(record.bedrooms),
            bathrooms: show(record.bathrooms),
            sqft: show(record.sqft),
            available: record.available.then(|| "on".to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.is_some()
    }

    pub fn update(&self) -> Result<PropertyUpdate, AppError> {
        let unit_label = self.unit_label.trim();
        Ok(PropertyUpdate {
            unit_label: (!unit_label.is_empty()).then(|| unit_label.to_string()),
            rent_cost: parse_bound("Rent", &self.rent_cost)?,
            bedrooms: parse_bound("Bedrooms", &self.bedrooms)?,
            bathrooms: parse_positive("Bathrooms", &self.bathrooms)?,
            sqft: parse_positive("Square feet", &self.sqft)?,
            can_rent: Some(self.available.is_none()),
        })
    }
}

/// Add-property form on /manage/new.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PropertyForm {
    pub street: String,
    pub city: String,
    pub state_code: String,
    pub zip_code: String,
    pub unit_label: String,
    pub rent_cost: String,
    pub sqft: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub available: Option<String>,
}

impl PropertyForm {
    /// Empty form: a Maine unit that is available to rent.
    pub fn blank() -> Self {
        PropertyForm {
            state_code: "ME".to_string(),
            available: Some("on".to_string()),
            ..PropertyForm::default()
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.is_some()
    }

    pub fn property(&self) -> Result<NewProperty, AppError> {
        let street = required_text("Street", &self.street)?;
        let city = required_text("City", &self.city)?;
        let state_code = self.state_code.trim().to_ascii_uppercase();
        if state_code.len() != 2 || !state_code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::BadRequest("State code must be two letters".to_string()));
        }
        let zip_code = self.zip_code.trim();
        if zip_code.len() != 5 || !zip_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::BadRequest("ZIP code must be five digits".to_string()));
        }
        let unit_label = self.unit_label.trim();

        Ok(NewProperty {
            street,
            city,
            state_code,
            zip_code: zip_code.to_string(),
            unit_label: (!unit_label.is_empty()).then(|| unit_label.to_string()),
            rent_cost: required_number("Rent", parse_bound("Rent", &self.rent_cost)?)?,
            sqft: required_number("Square feet", parse_positive("Square feet", &self.sqft)?)?,
            bedrooms: required_number("Bedrooms", parse_bound("Bedrooms", &self.bedrooms)?)?,
            bathrooms: required_number("Bathrooms", parse_positive("Bathrooms", &self.bathrooms)?)?,
            can_rent: !self.is_available(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub phone_number: String,
    pub birth_date: String,
    pub display_name: String,
    pub gender: String,
    pub user_type: String,
}

impl SignupForm {
    pub fn blank() -> Self {
        SignupForm {
            gender: Gender::Male.code().to_string(),
            user_type: "Renter".to_string(),
            ..SignupForm::default()
        }
    }

    pub fn is_landlord(&self) -> bool {
        self.user_type == "Landlord"
    }

    pub fn body(&self) -> Result<SignupBody, AppError> {
        let email = required_text("Email", &self.email)?;
        let username = required_text("Username", &self.username)?;
        if self.password.is_empty() {
            return Err(AppError::BadRequest("Password is required".to_string()));
        }
        if self.password != self.confirm_password {
            return Err(AppError::BadRequest("Passwords do not match".to_string()));
        }
        if !email.contains('@') {
            return Err(AppError::BadRequest("Email must be a valid address".to_string()));
        }
        let phone_number = required_text("Phone number", &self.phone_number)?;
        let birth_date = NaiveDate::parse_from_str(self.birth_date.trim(), "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest("Birth date must be a date (YYYY-MM-DD)".to_string()))?;
        let display_name = required_text("Display name", &self.display_name)?;
        let gender = Gender::from_code(&self.gender)
            .ok_or_else(|| AppError::BadRequest("Unknown gender option".to_string()))?;
        let user_type = UserType::parse(&self.user_type)
            .ok_or_else(|| AppError::BadRequest("Account type must be Renter or Landlord".to_string()))?;

        Ok(SignupBody {
            email,
            username,
            password: self.password.clone(),
            display_name,
            phone_number,
            birth_date,
            gender,
            user_type,
        })
    }

    /// What goes back into the form after a failed attempt. Passwords are not echoed.
    pub fn without_passwords(self) -> Self {
        SignupForm { password: String::new(), confirm_password: String::new(), ..self }
    }
}

/// Settings page form. `role` rides along as a hidden field so renter
/// preferences are only sent for renters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingsForm {
    pub role: String,
    pub display_name: String,
    pub email: String,
    pub phone_number: String,
    pub distance_max: String,
    pub gender_preferred: String,
}

impl SettingsForm {
    pub fn from_settings(settings: &AccountSettings) -> Self {
        SettingsForm {
            role: settings.role.clone().unwrap_or_default(),
            display_name: settings.display_name.clone(),
            email: settings.email.clone(),
            phone_number: settings.phone_number.clone(),
            distance_max: settings.distance_max.map(format_number).unwrap_or_default(),
            gender_preferred: settings.gender_preferred.code().to_string(),
        }
    }

    pub fn is_renter(&self) -> bool {
        self.role == "Renter"
    }

    pub fn role_label(&self) -> &str {
        if self.role.is_empty() { "Unknown" } else { &self.role }
    }

    pub fn update(&self) -> Result<SettingsUpdate, AppError> {
        let mut update = SettingsUpdate {
            email: self.email.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            display_name: self.display_name.trim().to_string(),
            ..SettingsUpdate::default()
        };
        if !update.email.is_empty() && !update.email.contains('@') {
            return Err(AppError::BadRequest("Email must be a valid address".to_string()));
        }
        if self.is_renter() {
            update.distance_max = parse_bound("Max distance", &self.distance_max)?;
            update.gender_preferred = Some(
                Gender::from_code(&self.gender_preferred)
                    .ok_or_else(|| AppError::BadRequest("Unknown gender option".to_string()))?,
            );
        }
        Ok(update)
    }
}

/// One `<option>` of a select box.
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Gender options with `unspecified` as the label for "?".
pub fn gender_choices(selected: &str, unspecified: &'static str) -> Vec<Choice> {
    Gender::ALL
        .into_iter()
        .map(|g| Choice {
            value: g.code(),
            label: if g == Gender::Unspecified { unspecified } else { g.label() },
            selected: g.code() == selected,
        })
        .collect()
}

fn required_text(label: &str, input: &str) -> Result<String, AppError> {
    let value = input.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", label)));
    }
    Ok(value.to_string())
}

fn required_number(label: &str, value: Option<f64>) -> Result<f64, AppError> {
    value.ok_or_else(|| AppError::BadRequest(format!("{} is required", label)))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Only same-site paths are followed after login.
pub fn safe_redirect(target: Option<&str>) -> &str {
    match target {
        // Browsers read `/\host` like `//host` and drop tabs and newlines before parsing.
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.chars().any(|c| c == '\\' || c.is_control()) =>
        {
            path
        }
        _ => "/properties",
    }
}
