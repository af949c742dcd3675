//! Mapping of raw detail records to [`CashPoint`]s.

use serde_json::Value;

use crate::error::{HarvesterError, Result};
use crate::fetcher::{BatchFetcher, FetchProgress};
use crate::fields;
use crate::http::Transport;
use crate::types::{CashPoint, PointType};

/// Map one detail record.
///
/// A missing `id` or an unknown `type` is a data error. Coordinates sent as
/// `null` become `0.0`.
pub fn cash_point_from_json(value: &Value) -> Result<CashPoint> {
    let id = fields::required_i64(value, "id", "cash point")?;
    let context = format!("cash point {id}");

    let type_name = fields::required_str(value, "type", &context)?;
    let point_type = PointType::parse(type_name).ok_or_else(|| HarvesterError::InvalidField {
        field: "type".to_string(),
        context: context.clone(),
        value: type_name.to_string(),
    })?;

    let bank_id = fields::required_i64(value, "bank_id", &context)?;
    let town_id = fields::optional_i64(value, "region_id").unwrap_or_default();

    let mut point = CashPoint::new(id, point_type, bank_id, town_id);
    point.longitude = fields::coordinate(value, "longitude");
    point.latitude = fields::coordinate(value, "latitude");
    point.address = fields::text(value, "address");
    point.address_comment = fields::text(value, "address_comment");
    point.metro_name = fields::text(value, "metro_name");
    point.free_access = fields::flag_or(value, "free_access", true);
    point.main_office = fields::flag(value, "is_main_office");
    point.without_weekend = fields::flag(value, "without_weekend");
    point.round_the_clock = fields::flag(value, "round_the_clock");
    point.works_as_shop = fields::flag(value, "works_as_shop");
    point.schedule_general = fields::text(value, "schedule_general");
    point.schedule_private = fields::text(value, "schedule_private");
    point.schedule_vip = fields::text(value, "schedule_vip");
    point.tel = fields::text(value, "phone");
    point.additional = fields::text(value, "additional");
    Ok(point)
}

/// Fetch and map every point of one town. Any bad record fails the town.
///
/// Records that carry no town of their own are attributed to `town_id`.
pub fn fetch_cash_points<T: Transport>(
    fetcher: &BatchFetcher<'_, T>,
    town_id: i64,
    progress: impl FnMut(FetchProgress),
) -> Result<Vec<CashPoint>> {
    fetcher
        .fetch_scope(town_id, progress)?
        .iter()
        .map(|record| {
            let mut point = cash_point_from_json(record)?;
            if point.town_id == 0 {
                point.town_id = town_id;
            }
            Ok(point)
        })
        .collect()
}
