use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use menza_remote::model::{
    CafeteriaInfo, Dish, DishCategory, MenuDay, OpeningHours, Pictogram, ServingPlace, Subsystem,
};
use menza_sync::StoredRecord;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Render one stored record of `collection` for the terminal.
pub fn render(collection: &str, record: &StoredRecord) -> Result<String> {
    let text = match collection {
        "subsystems" => subsystem(&record.decode()?),
        "dishes" => dish(&record.decode()?),
        "dish-categories" => {
            let category: DishCategory = record.decode()?;
            format!("{:>4}  {}", category.id, category.name)
        }
        "serving-places" => {
            let place: ServingPlace = record.decode()?;
            match place.abbreviation {
                Some(abbr) => format!("{:>4}  {} ({abbr})", place.id, place.name),
                None => format!("{:>4}  {}", place.id, place.name),
            }
        }
        "pictograms" => {
            let pictogram: Pictogram = record.decode()?;
            format!("{:>4}  {}", pictogram.id, pictogram.name)
        }
        "cafeteria-info" => cafeteria_info(&record.decode()?),
        "weekly-menu" => menu_day(&record.decode()?),
        _ => record.body.clone(),
    };
    Ok(text)
}

fn subsystem(s: &Subsystem) -> String {
    let state = if s.open { "open" } else { "closed" };
    format!("{:>4}  {:<40} {state}", s.id, s.name)
}

fn dish(d: &Dish) -> String {
    let mut line = format!("{:>4}  {}", d.id, d.name);
    if let Some(weight) = &d.weight {
        line.push_str(&format!(" ({weight})"));
    }
    let prices: Vec<String> = [d.price_student_cents, d.price_employee_cents]
        .into_iter()
        .flatten()
        .map(format_price)
        .collect();
    if !prices.is_empty() {
        line.push_str(&format!("  {}", prices.join(" / ")));
    }
    line
}

fn cafeteria_info(info: &CafeteriaInfo) -> String {
    let mut lines = vec![info.name.clone()];
    for (label, value) in [
        ("Address", &info.address),
        ("Phone", &info.phone),
        ("Email", &info.email),
    ] {
        if let Some(value) = value {
            lines.push(format!("  {label:<8} {value}"));
        }
    }
    for hours in &info.opening_hours {
        lines.push(format!("  {}", opening_hours(hours)));
    }
    lines.join("\n")
}

fn opening_hours(hours: &OpeningHours) -> String {
    let day = |n: u8| WEEKDAYS[usize::from(n.clamp(1, 7)) - 1];
    let days = if hours.day_from == hours.day_to {
        day(hours.day_from).to_owned()
    } else {
        format!("{}-{}", day(hours.day_from), day(hours.day_to))
    };
    let mut line = format!(
        "{days:<8} {}-{}",
        hours.start.format("%H:%M"),
        hours.end.format("%H:%M")
    );
    if let Some(description) = &hours.description {
        line.push_str(&format!("  {description}"));
    }
    line
}

fn menu_day(day: &MenuDay) -> String {
    let mut lines = vec![format!(
        "{} (week {})",
        day.date.format("%a %Y-%m-%d"),
        day.week_ordinal
    )];
    for course in &day.courses {
        let amount = course.amount.as_deref().unwrap_or("");
        lines.push(format!("  {:<12} {} {amount}", course.course, course.name));
    }
    lines.join("\n")
}

/// `8950` → `89,50 Kč`
pub fn format_price(cents: u32) -> String {
    format!("{},{:02} Kč", cents / 100, cents % 100)
}

/// Timestamp in the server's local time, or `never`.
pub fn format_timestamp(at: Option<DateTime<Utc>>, offset: &FixedOffset) -> String {
    match at {
        Some(at) => at.with_timezone(offset).format("%Y-%m-%d %H:%M").to_string(),
        None => "never".to_owned(),
    }
}
