//! One-line chat summaries of compute records.
//!
//! The `*_at` variants take "now" explicitly and are fully deterministic; the
//! plain variants use the wall clock for the relative creation time.

use chrono::{DateTime, Utc};
use nimbus_common::{Flavor, Image, Server};

pub const BULLET: &str = "• ";

pub fn flavor_info(flavor: &Flavor) -> String {
    format!(
        "{} - ram:{} Mo, disk: {}Go, vcpus: {}, swap: {}\n",
        flavor.name, flavor.ram, flavor.disk, flavor.vcpus, flavor.swap
    )
}

pub fn server_info(server: &Server) -> String {
    server_info_at(server, Utc::now())
}

pub fn server_info_at(server: &Server, now: DateTime<Utc>) -> String {
    format!(
        "{} / {}: {}, id: {}, key_pair: {}, tenant: {},  {}\n",
        server.name,
        server.private_addresses.join(","),
        server.status,
        server.id,
        server.key_name.as_deref().unwrap_or_default(),
        server.tenant_id,
        humanize_since(server.created, now)
    )
}

pub fn image_info(image: &Image) -> String {
    image_info_at(image, Utc::now())
}

pub fn image_info_at(image: &Image, now: DateTime<Utc>) -> String {
    format!("{},  {}\n", image.name, humanize_since(image.created, now))
}

/// Concatenates one bulleted line per item. An empty slice yields an empty string.
pub fn bullet_list<T>(items: &[T], line: impl Fn(&T) -> String) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", BULLET, line(item)))
        .collect()
}

/// "3 hours ago" / "in a minute", rounded the way people say it.
pub fn humanize_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta_ms = (now - then).num_milliseconds();
    let phrase = relative_phrase(delta_ms.unsigned_abs() as f64 / 1000.0);
    if delta_ms >= 0 {
        format!("{} ago", phrase)
    } else {
        format!("in {}", phrase)
    }
}

fn relative_phrase(secs: f64) -> String {
    let seconds = secs.round();
    let minutes = (secs / 60.0).round();
    let hours = (secs / 3_600.0).round();
    let days = (secs / 86_400.0).round();
    // 400 years hold 146097 days and 4800 months.
    let months = (secs / 86_400.0 * 4_800.0 / 146_097.0).round();
    let years = (months / 12.0).round();

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{} minutes", minutes)
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{} hours", hours)
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{} days", days)
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{} months", months)
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{} years", years)
    }
}
