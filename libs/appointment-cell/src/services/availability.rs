use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use tracing::debug;

use shared_models::domain::AppointmentStatus;
use shared_store::Store;

use crate::models::{AppointmentError, SlotAvailability, SlotStatus};

/// First bookable slot of the day, 09:00.
const GRID_START_HOUR: u32 = 9;
/// Last bookable slot of the day, 17:30.
const GRID_END_HOUR: u32 = 17;
const GRID_END_MINUTE: u32 = 30;
const SLOT_MINUTES: u32 = 30;

/// Deterministic free/busy calendar for one physician and one date.
///
/// The grid itself never depends on stored data; only the booked set does.
/// The read is uncoordinated with concurrent bookings, so a slot reported
/// available can be taken by the time the caller books it.
pub struct AvailabilityService {
    store: Store,
}

impl AvailabilityService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Canonical labels of the booked slots, ascending.
    pub async fn booked_labels(
        &self,
        physician_username: &str,
        date: &str,
    ) -> Result<Vec<String>, AppointmentError> {
        let (day_start, day_end) = day_window(date)?;
        debug!(
            "Resolving booked slots for {} on {}",
            physician_username, date
        );

        let appointments = self
            .store
            .appointments
            .booked_in_window(physician_username, day_start, day_end)
            .await?;

        let mut labels: Vec<String> = appointments
            .iter()
            .filter(|a| a.status != AppointmentStatus::Rejected)
            .map(|a| slot_label(a.start_time.time()))
            .collect();
        labels.dedup();
        Ok(labels)
    }

    /// The full grid with a status per slot, in grid order.
    pub async fn compute_availability(
        &self,
        physician_username: &str,
        date: &str,
    ) -> Result<Vec<SlotAvailability>, AppointmentError> {
        let booked: HashSet<String> = self
            .booked_labels(physician_username, date)
            .await?
            .into_iter()
            .collect();

        Ok(slot_grid()
            .into_iter()
            .map(|time| {
                let label = slot_label(time);
                let status = if booked.contains(&label) {
                    SlotStatus::Booked
                } else {
                    SlotStatus::Available
                };
                SlotAvailability { label, status }
            })
            .collect())
    }
}

/// Business-hours grid: 09:00 through 17:30 in 30-minute steps.
pub fn slot_grid() -> Vec<NaiveTime> {
    let mut slots = Vec::new();
    let mut hour = GRID_START_HOUR;
    let mut minute = 0;
    loop {
        slots.push(NaiveTime::from_hms_opt(hour, minute, 0).unwrap());
        if hour == GRID_END_HOUR && minute == GRID_END_MINUTE {
            break;
        }
        minute += SLOT_MINUTES;
        if minute == 60 {
            minute = 0;
            hour += 1;
        }
    }
    slots
}

/// Canonical slot label: 12-hour clock, no leading zero, upper-case AM/PM.
/// This rendering is a wire contract; clients compare labels bit-for-bit.
pub fn slot_label(time: NaiveTime) -> String {
    let hour = time.hour();
    let meridiem = if hour < 12 { "AM" } else { "PM" };
    let hour12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", hour12, time.minute(), meridiem)
}

/// UTC day window [00:00:00, 23:59:59] for a `YYYY-MM-DD` date string.
pub fn day_window(date: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), AppointmentError> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppointmentError::InvalidInput)?;
    let start = day.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let end = day.and_hms_opt(23, 59, 59).unwrap().and_utc();
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_eighteen_slots() {
        let grid = slot_grid();
        assert_eq!(grid.len(), 18);
        assert_eq!(grid[0], NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(
            *grid.last().unwrap(),
            NaiveTime::from_hms_opt(17, 30, 0).unwrap()
        );
    }

    #[test]
    fn labels_render_canonically() {
        assert_eq!(slot_label(NaiveTime::from_hms_opt(9, 0, 0).unwrap()), "9:00 AM");
        assert_eq!(slot_label(NaiveTime::from_hms_opt(11, 30, 0).unwrap()), "11:30 AM");
        assert_eq!(slot_label(NaiveTime::from_hms_opt(12, 0, 0).unwrap()), "12:00 PM");
        assert_eq!(slot_label(NaiveTime::from_hms_opt(13, 0, 0).unwrap()), "1:00 PM");
        assert_eq!(slot_label(NaiveTime::from_hms_opt(17, 30, 0).unwrap()), "5:30 PM");
    }

    #[test]
    fn day_window_spans_whole_day() {
        let (start, end) = day_window("2024-01-10").unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-10T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-10T23:59:59+00:00");
    }

    #[test]
    fn malformed_date_is_rejected() {
        assert!(day_window("10/01/2024").is_err());
        assert!(day_window("").is_err());
    }
}
