use std::collections::HashSet;
use std::fmt::Display;

use chrono::{NaiveDate, NaiveTime};
use menza_sync::{ConvertError, StorageError, StoredRecord};
use serde::{Deserialize, Serialize};

/// A cafeteria, canteen, or other independently run serving subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsystem {
    pub id: u32,
    pub name: String,
    pub kind: Option<String>,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub id: u32,
    pub subsystem_id: u32,
    pub name: String,
    pub category_id: Option<u32>,
    pub serving_place_ids: Vec<u32>,
    pub price_student_cents: Option<u32>,
    pub price_employee_cents: Option<u32>,
    pub weight: Option<String>,
    pub allergens: Vec<u32>,
    pub pictogram_ids: Vec<u32>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishCategory {
    pub id: u32,
    pub name: String,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingPlace {
    pub id: u32,
    pub name: String,
    pub abbreviation: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pictogram {
    pub id: u32,
    pub name: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CafeteriaInfo {
    pub subsystem_id: u32,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub opening_hours: Vec<OpeningHours>,
}

/// Opening hours for a range of weekdays (1 = Monday, 7 = Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub day_from: u8,
    pub day_to: u8,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub description: Option<String>,
}

/// One day of the weekly menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuDay {
    pub date: NaiveDate,
    pub week_ordinal: u32,
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub course: String,
    pub name: String,
    pub amount: Option<String>,
}

/// Parse a decimal price such as `119`, `119.5`, or `119,50 Kč` into cents.
pub fn parse_price_cents(raw: &str) -> Result<u32, ConvertError> {
    let invalid = || ConvertError::invalid("price", raw);

    let trimmed = raw.trim();
    let number = trimmed
        .strip_suffix("Kč")
        .map(str::trim_end)
        .unwrap_or(trimmed)
        .replace(',', ".");

    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number.as_str(), ""),
    };

    if whole.is_empty()
        || fraction.len() > 2
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: u32 = whole.parse().map_err(|_| invalid())?;
    let fraction: u32 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u32>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    whole
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(fraction))
        .ok_or_else(invalid)
}

pub fn parse_optional_price(raw: Option<&str>) -> Result<Option<u32>, ConvertError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(price) => parse_price_cents(price).map(Some),
    }
}

/// Trimmed name, rejecting blank ones.
pub fn require_name(name: &str) -> Result<String, ConvertError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ConvertError::MissingField("name"));
    }
    Ok(name.to_owned())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ConvertError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ConvertError::invalid("date", raw))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, ConvertError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| ConvertError::invalid("time", raw))
}

/// Fail on the first id that appears twice.
pub fn ensure_unique<I, T>(ids: I) -> Result<(), ConvertError>
where
    I: IntoIterator<Item = T>,
    T: Display + Eq + std::hash::Hash,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.to_string()) {
            return Err(ConvertError::Duplicate(id.to_string()));
        }
    }
    Ok(())
}

/// Encode `items` as stored records keyed by `id`.
pub fn to_records<T, K, F>(items: &[T], id: F) -> Result<Vec<StoredRecord>, StorageError>
where
    T: Serialize,
    K: Display,
    F: Fn(&T) -> K,
{
    items
        .iter()
        .map(|item| StoredRecord::encode(id(item).to_string(), item))
        .collect()
}
