//! Week calendars: slot times, summaries, and the read model
//!
//! A calendar cell is addressed by ISO weekday (0 = Monday) and hour of day
//! in the user's posting timezone. Everything stored is UTC.

use crate::db::{parse_ts, CommittedSend, Database, DbError, DraftSlot, Topic, WeekCalendar};
use crate::schema::{committed_sends, draft_slots, week_calendars};
use crate::tone::effective_text;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc, Weekday};
use diesel::prelude::*;
use serde::Serialize;

pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn weekday_from_index(day: u32) -> Option<Weekday> {
    match day {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Fixed posting offset; out-of-range minutes fall back to UTC
pub fn posting_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// ISO (year, week) that `now` falls in at the posting offset
pub fn iso_week_of(now: DateTime<Utc>, utc_offset_minutes: i32) -> (i32, u32) {
    let local = now.with_timezone(&posting_offset(utc_offset_minutes));
    let week = local.iso_week();
    (week.year(), week.week())
}

/// Absolute UTC instant of a calendar cell.
///
/// `None` when the week, weekday or hour does not exist.
pub fn slot_time(iso_year: i32, week: u32, weekday: u32, hour: u32, utc_offset_minutes: i32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_isoywd_opt(iso_year, week, weekday_from_index(weekday)?)?;
    let local = date.and_hms_opt(hour, 0, 0)?;
    posting_offset(utc_offset_minutes)
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a send time given on the command line.
///
/// Accepts RFC 3339, or `YYYY-MM-DD HH:MM` read in the posting timezone.
pub fn parse_when(raw: &str, utc_offset_minutes: i32) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Some(at) = parse_ts(raw) {
        return Some(at);
    }
    let local = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?;
    posting_offset(utc_offset_minutes)
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Human-readable note stored with each calendar
pub fn summary_text(week: u32, topics: &[Topic]) -> String {
    let mut text = format!(
        "Your post schedule for week {} is below. We recommend talking about these topics this week:\n",
        week
    );
    for topic in topics {
        text.push_str(&format!("• {}\n", topic.name));
    }
    text.push('\n');

    let trending = topics.iter().filter(|t| t.is_trend()).count();
    let evergreen = topics.len() - trending;
    match (trending, evergreen) {
        (0, n) => text.push_str(&format!(
            "All {} topics are evergreen: recently popular subjects that perform well when you post about them consistently.\n",
            n
        )),
        (n, 0) => text.push_str(&format!("All {} topics are trending right now.\n", n)),
        (t, e) => text.push_str(&format!("{} topics are trending right now and {} are evergreen.\n", t, e)),
    }
    text.push_str("\nEvery post can be edited or moved to a different time before it goes out.\n");
    text
}

// ============================================================================
// Read Model
// ============================================================================

/// Where a slot's post stands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Shown on the calendar, never dispatched
    Suggested,
    /// Committed to a send time, waiting for the dispatcher
    Scheduled,
    /// Published
    Posted,
    /// Gave up after repeated publish failures
    Failed,
    /// The send was uncommitted
    Removed,
}

impl SlotStatus {
    pub fn of(send: Option<&CommittedSend>, max_failures: i32) -> Self {
        match send {
            None => SlotStatus::Removed,
            Some(s) if s.is_posted() => SlotStatus::Posted,
            Some(s) if !s.is_committed() => SlotStatus::Suggested,
            Some(s) if max_failures > 0 && s.failures >= max_failures => SlotStatus::Failed,
            Some(_) => SlotStatus::Scheduled,
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SlotStatus::Suggested => "suggested",
            SlotStatus::Scheduled => "scheduled",
            SlotStatus::Posted => "posted",
            SlotStatus::Failed => "failed",
            SlotStatus::Removed => "removed",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub slot_id: i32,
    pub weekday: i32,
    pub hour: i32,
    pub draft_post_id: String,
    pub send_id: Option<i32>,
    pub text: String,
    pub status: SlotStatus,
    pub scheduled_for: Option<String>,
    pub posted_at: Option<String>,
    pub platform_post_id: Option<String>,
    pub failures: i32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarView {
    pub calendar: WeekCalendar,
    pub slots: Vec<SlotView>,
}

impl Database {
    /// Most recently created calendar for a user and ISO week
    pub fn latest_calendar(&self, user_id: &str, iso_year: i32, week: u32) -> Result<Option<WeekCalendar>, DbError> {
        let mut conn = self.get_conn()?;
        let calendar = week_calendars::table
            .filter(week_calendars::user_id.eq(user_id))
            .filter(week_calendars::iso_year.eq(iso_year))
            .filter(week_calendars::week_number.eq(week as i32))
            .order(week_calendars::id.desc())
            .first::<WeekCalendar>(&mut conn)
            .optional()?;
        Ok(calendar)
    }

    pub fn slots_for_calendar(&self, calendar_id: i32) -> Result<Vec<DraftSlot>, DbError> {
        let mut conn = self.get_conn()?;
        let slots = draft_slots::table
            .filter(draft_slots::calendar_id.eq(calendar_id))
            .order((draft_slots::weekday.asc(), draft_slots::hour.asc(), draft_slots::id.asc()))
            .load::<DraftSlot>(&mut conn)?;
        Ok(slots)
    }

    /// Slots of the latest calendar for the week, joined to the text that
    /// would go out and the state of each send.
    pub fn calendar_for(&self, user_id: &str, iso_year: i32, week: u32, max_failures: i32) -> Result<Option<CalendarView>, DbError> {
        let Some(calendar) = self.latest_calendar(user_id, iso_year, week)? else {
            return Ok(None);
        };
        let slots = self.slots_for_calendar(calendar.id)?;

        let mut conn = self.get_conn()?;
        let send_ids: Vec<i32> = slots.iter().filter_map(|s| s.send_id).collect();
        let sends = committed_sends::table
            .filter(committed_sends::id.eq_any(send_ids))
            .load::<CommittedSend>(&mut conn)?;

        let mut views = Vec::with_capacity(slots.len());
        for slot in slots {
            let send = slot.send_id.and_then(|id| sends.iter().find(|s| s.id == id));
            let text = effective_text(&mut conn, &slot.draft_post_id, user_id)?;
            views.push(SlotView {
                slot_id: slot.id,
                weekday: slot.weekday,
                hour: slot.hour,
                draft_post_id: slot.draft_post_id,
                send_id: slot.send_id,
                text,
                status: SlotStatus::of(send, max_failures),
                scheduled_for: send.and_then(|s| s.scheduled_for.clone()),
                posted_at: send.and_then(|s| s.posted_at.clone()),
                platform_post_id: send.and_then(|s| s.platform_post_id.clone()),
                failures: send.map(|s| s.failures).unwrap_or(0),
                last_error: send.and_then(|s| s.last_error.clone()),
            });
        }

        Ok(Some(CalendarView { calendar, slots: views }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str, source: &str) -> Topic {
        Topic {
            id: name.to_string(),
            niche_id: "n".to_string(),
            name: name.to_string(),
            description: None,
            source: source.to_string(),
            size: 1,
            rank: 5,
            created_at: "2026-03-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_slot_time_monday_morning() {
        // ISO week 11 of 2026 starts on Monday 9 March
        let at = slot_time(2026, 11, 0, 9, 0).unwrap();
        assert_eq!(at.to_rfc3339(), "2026-03-09T09:00:00+00:00");

        let sunday = slot_time(2026, 11, 6, 17, 0).unwrap();
        assert_eq!(sunday.to_rfc3339(), "2026-03-15T17:00:00+00:00");
    }

    #[test]
    fn test_slot_time_applies_offset() {
        // 09:00 at UTC+2 is 07:00 UTC
        let at = slot_time(2026, 11, 0, 9, 120).unwrap();
        assert_eq!(at.to_rfc3339(), "2026-03-09T07:00:00+00:00");
    }

    #[test]
    fn test_slot_time_rejects_bad_cells() {
        assert!(slot_time(2026, 11, 7, 9, 0).is_none());
        assert!(slot_time(2026, 11, 0, 24, 0).is_none());
        assert!(slot_time(2026, 60, 0, 9, 0).is_none());
    }

    #[test]
    fn test_parse_when_formats() {
        assert_eq!(
            parse_when("2026-03-09T09:00:00+01:00", 0).map(|t| t.to_rfc3339()),
            Some("2026-03-09T08:00:00+00:00".to_string())
        );
        assert_eq!(
            parse_when("2026-03-09 09:00", -300).map(|t| t.to_rfc3339()),
            Some("2026-03-09T14:00:00+00:00".to_string())
        );
        assert!(parse_when("next tuesday", 0).is_none());
    }

    #[test]
    fn test_iso_week_respects_offset() {
        let late_sunday = DateTime::parse_from_rfc3339("2026-03-08T23:30:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(iso_week_of(late_sunday, 0), (2026, 10));
        assert_eq!(iso_week_of(late_sunday, 60), (2026, 11));
    }

    #[test]
    fn test_summary_counts_sources() {
        let text = summary_text(11, &[topic("tempo runs", "trend"), topic("stretching", "evergreen")]);
        assert!(text.contains("week 11"));
        assert!(text.contains("• tempo runs"));
        assert!(text.contains("1 topics are trending right now and 1 are evergreen"));

        let evergreen_only = summary_text(11, &[topic("stretching", "evergreen")]);
        assert!(evergreen_only.contains("All 1 topics are evergreen"));
    }

    #[test]
    fn test_status_of_send() {
        let mut send = CommittedSend {
            id: 1,
            user_id: "u".to_string(),
            draft_post_id: "d".to_string(),
            calendar_id: None,
            scheduled_for: None,
            posted_at: None,
            platform_post_id: None,
            failures: 0,
            last_error: None,
            created_at: "2026-03-01T00:00:00Z".to_string(),
        };
        assert_eq!(SlotStatus::of(None, 0), SlotStatus::Removed);
        assert_eq!(SlotStatus::of(Some(&send), 0), SlotStatus::Suggested);

        send.scheduled_for = Some("2026-03-09T09:00:00Z".to_string());
        send.failures = 3;
        assert_eq!(SlotStatus::of(Some(&send), 0), SlotStatus::Scheduled);
        assert_eq!(SlotStatus::of(Some(&send), 3), SlotStatus::Failed);

        send.posted_at = Some("2026-03-09T09:01:00Z".to_string());
        assert_eq!(SlotStatus::of(Some(&send), 3), SlotStatus::Posted);
    }
}
