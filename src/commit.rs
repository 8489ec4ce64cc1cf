//! Committing posts to send times
//!
//! A suggested send becomes dispatchable once it has a `scheduled_for`.
//! Rows that were posted are history and can no longer be touched.

use crate::calendar::slot_time;
use crate::db::{format_ts, last_insert_id, CommittedSend, Database, DbError, NewCommittedSend};
use crate::schema::{committed_sends, draft_posts, draft_slots, users, week_calendars};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("send {0} was already posted")]
    AlreadyPosted(i32),

    #[error("send {0} not found")]
    NotFound(i32),

    #[error("{when} is more than {horizon_days} days ahead")]
    BeyondHorizon { when: String, horizon_days: i64 },

    #[error("send {0} has no calendar slot to take a time from")]
    NoSlot(i32),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<diesel::result::Error> for CommitError {
    fn from(e: diesel::result::Error) -> Self {
        CommitError::Db(DbError::Query(e))
    }
}

pub type Result<T> = std::result::Result<T, CommitError>;

fn load_unposted(conn: &mut SqliteConnection, send_id: i32) -> Result<CommittedSend> {
    let send = committed_sends::table
        .filter(committed_sends::id.eq(send_id))
        .first::<CommittedSend>(conn)
        .optional()?
        .ok_or(CommitError::NotFound(send_id))?;
    if send.is_posted() {
        return Err(CommitError::AlreadyPosted(send_id));
    }
    Ok(send)
}

/// Promotes suggestions to send times and takes them back
pub struct CommitStore<'a> {
    db: &'a Database,
    horizon_days: i64,
    utc_offset_minutes: i32,
}

impl<'a> CommitStore<'a> {
    pub fn new(db: &'a Database, horizon_days: i64, utc_offset_minutes: i32) -> Self {
        Self { db, horizon_days, utc_offset_minutes }
    }

    fn check_horizon(&self, when: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        if self.horizon_days > 0 && when > now + Duration::days(self.horizon_days) {
            return Err(CommitError::BeyondHorizon { when: format_ts(when), horizon_days: self.horizon_days });
        }
        Ok(())
    }

    /// Set the send time of an existing row.
    ///
    /// Recommitting a row clears its failure count.
    /// Posted rows fail with `AlreadyPosted` whatever `when` is.
    pub fn commit(&self, send_id: i32, when: DateTime<Utc>, now: DateTime<Utc>) -> Result<CommittedSend> {
        let scheduled_for = format_ts(when);

        let send = self.db.transaction(|conn| -> Result<CommittedSend> {
            load_unposted(conn, send_id)?;
            self.check_horizon(when, now)?;
            diesel::update(
                committed_sends::table
                    .filter(committed_sends::id.eq(send_id))
                    .filter(committed_sends::posted_at.is_null()),
            )
            .set((
                committed_sends::scheduled_for.eq(Some(scheduled_for.as_str())),
                committed_sends::failures.eq(0),
                committed_sends::last_error.eq(None::<String>),
            ))
            .execute(conn)?;
            Ok(committed_sends::table
                .filter(committed_sends::id.eq(send_id))
                .first::<CommittedSend>(conn)?)
        })?;

        info!(send_id, scheduled_for = %scheduled_for, "committed send");
        Ok(send)
    }

    /// Schedule a draft that had no suggestion row
    pub fn commit_new(&self, user_id: &str, draft_id: &str, when: DateTime<Utc>, now: DateTime<Utc>) -> Result<i32> {
        self.check_horizon(when, now)?;
        let scheduled_for = format_ts(when);
        let created_at = format_ts(now);

        let send_id = self.db.transaction(|conn| -> Result<i32> {
            let user_exists: i64 = users::table.filter(users::id.eq(user_id)).count().get_result(conn)?;
            if user_exists == 0 {
                return Err(DbError::NotFound { kind: "user", id: user_id.to_string() }.into());
            }
            let draft_exists: i64 = draft_posts::table.filter(draft_posts::id.eq(draft_id)).count().get_result(conn)?;
            if draft_exists == 0 {
                return Err(DbError::NotFound { kind: "draft post", id: draft_id.to_string() }.into());
            }

            diesel::insert_into(committed_sends::table)
                .values(&NewCommittedSend {
                    user_id,
                    draft_post_id: draft_id,
                    calendar_id: None,
                    scheduled_for: Some(&scheduled_for),
                    posted_at: None,
                    platform_post_id: None,
                    failures: 0,
                    last_error: None,
                    created_at: &created_at,
                })
                .execute(conn)?;
            Ok(last_insert_id(conn)?)
        })?;

        info!(send_id, user_id, draft_id, scheduled_for = %scheduled_for, "committed new send");
        Ok(send_id)
    }

    /// Commit a suggestion at the time of the calendar cell it sits in
    pub fn accept_slot(&self, send_id: i32, now: DateTime<Utc>) -> Result<CommittedSend> {
        let mut conn = self.db.get_conn()?;
        load_unposted(&mut conn, send_id)?;
        let cell = draft_slots::table
            .inner_join(week_calendars::table)
            .filter(draft_slots::send_id.eq(send_id))
            .select((week_calendars::iso_year, week_calendars::week_number, draft_slots::weekday, draft_slots::hour))
            .first::<(i32, i32, i32, i32)>(&mut conn)
            .optional()?;
        drop(conn);

        let Some((iso_year, week, weekday, hour)) = cell else {
            return Err(CommitError::NoSlot(send_id));
        };

        let when = slot_time(iso_year, week as u32, weekday as u32, hour as u32, self.utc_offset_minutes)
            .ok_or(CommitError::NoSlot(send_id))?;
        self.commit(send_id, when, now)
    }

    /// Delete a send that has not gone out yet
    pub fn uncommit(&self, send_id: i32) -> Result<()> {
        self.db.transaction(|conn| -> Result<()> {
            load_unposted(conn, send_id)?;
            diesel::delete(
                committed_sends::table
                    .filter(committed_sends::id.eq(send_id))
                    .filter(committed_sends::posted_at.is_null()),
            )
            .execute(conn)?;
            Ok(())
        })?;

        info!(send_id, "uncommitted send");
        Ok(())
    }
}
