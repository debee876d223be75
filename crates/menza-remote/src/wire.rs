//! Response bodies of the cafeteria backend, as served.
//!
//! Prices and dates stay strings here. Units validate them when converting
//! into [`crate::model`] types.

use serde::Deserialize;

/// `GET /v1/{lang}/hash/{resource}`
#[derive(Debug, Deserialize)]
pub struct HashDto {
    pub hash: String,
}

/// `GET /v1/{lang}/subsystems`
#[derive(Debug, Clone, Deserialize)]
pub struct SubsystemDto {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub open: bool,
}

/// `GET /v1/{lang}/subsystems/{id}/dishes`
#[derive(Debug, Clone, Deserialize)]
pub struct DishDto {
    pub id: u32,
    pub name: String,
    pub category_id: Option<u32>,
    #[serde(default)]
    pub serving_place_ids: Vec<u32>,
    pub price_student: Option<String>,
    pub price_employee: Option<String>,
    pub weight: Option<String>,
    #[serde(default)]
    pub allergens: Vec<u32>,
    #[serde(default)]
    pub pictogram_ids: Vec<u32>,
    pub photo_url: Option<String>,
}

/// `GET /v1/{lang}/subsystems/{id}/categories`
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDto {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub order: i32,
}

/// `GET /v1/{lang}/subsystems/{id}/serving-places`
#[derive(Debug, Clone, Deserialize)]
pub struct ServingPlaceDto {
    pub id: u32,
    pub name: String,
    pub abbreviation: Option<String>,
    pub description: Option<String>,
}

/// `GET /v1/{lang}/pictograms`
#[derive(Debug, Clone, Deserialize)]
pub struct PictogramDto {
    pub id: u32,
    pub name: String,
    pub icon_url: Option<String>,
}

/// `GET /v1/{lang}/subsystems/{id}/info`
#[derive(Debug, Clone, Deserialize)]
pub struct CafeteriaInfoDto {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub opening_hours: Vec<OpeningHoursDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpeningHoursDto {
    /// First day of the range, 1 = Monday.
    pub day_from: u8,
    pub day_to: u8,
    /// `HH:MM`
    pub start: String,
    pub end: String,
    pub description: Option<String>,
}

/// `GET /v1/{lang}/subsystems/{id}/weeks`
#[derive(Debug, Clone, Deserialize)]
pub struct WeekRefDto {
    pub id: u32,
    pub ordinal: u32,
}

/// `GET /v1/{lang}/subsystems/{id}/weeks/{week}`
#[derive(Debug, Clone, Deserialize)]
pub struct WeekDto {
    pub ordinal: u32,
    #[serde(default)]
    pub days: Vec<WeekDayDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeekDayDto {
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(default)]
    pub courses: Vec<CourseDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseDto {
    pub course: String,
    pub name: String,
    pub amount: Option<String>,
}
