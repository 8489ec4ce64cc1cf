//! Dispatching committed sends
//!
//! Each run picks up every committed, unposted send whose time has passed,
//! groups them by user, and publishes them in scheduled order. Every
//! successful post is recorded before the next one is attempted. A rejected
//! publish stops the rest of that user's posts for the run; other users are
//! not affected.

use crate::db::{format_ts, CommittedSend, Database, DbError};
use crate::external::{run_command, CommandOutcome, EXIT_BAD_CONTENT, EXIT_RATE_LIMITED, EXIT_UNAUTHORIZED};
use crate::retry::{RateLimited, RetryPolicy};
use crate::schema::committed_sends;
use crate::tone::ToneGate;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

// ============================================================================
// Publishing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PublishError {
    #[error("rate limited")]
    RateLimited,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad content: {0}")]
    BadContent(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl RateLimited for PublishError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, PublishError::RateLimited)
    }
}

/// Platform credentials for one user, scoped to one dispatch run
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub access_token: String,
    pub access_token_secret: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.access_token_secret.trim().is_empty()
    }
}

/// Where credentials come from
pub trait CredentialStore {
    fn credentials_for(&self, user_id: &str) -> Result<Option<Credentials>, DbError>;
}

impl CredentialStore for Database {
    fn credentials_for(&self, user_id: &str) -> Result<Option<Credentials>, DbError> {
        Ok(self.latest_credentials(user_id)?.map(|row| Credentials {
            access_token: row.access_token,
            access_token_secret: row.access_token_secret,
        }))
    }
}

/// Posts text to the social platform, returning the platform's post id
pub trait Publisher {
    fn publish(&self, credentials: &Credentials, text: &str) -> Result<String, PublishError>;
}

/// Retries rate limited publishes under a policy
pub struct RetryingPublisher<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: Publisher> RetryingPublisher<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<P: Publisher> Publisher for RetryingPublisher<P> {
    fn publish(&self, credentials: &Credentials, text: &str) -> Result<String, PublishError> {
        self.policy.run(|| self.inner.publish(credentials, text))
    }
}

/// Publishes through a shell command.
///
/// The text goes in on stdin, credentials in `PICKR_ACCESS_TOKEN` and
/// `PICKR_ACCESS_TOKEN_SECRET`. The command prints the platform post id.
pub struct CommandPublisher {
    command: String,
}

impl CommandPublisher {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl Publisher for CommandPublisher {
    fn publish(&self, credentials: &Credentials, text: &str) -> Result<String, PublishError> {
        let env = [
            ("PICKR_ACCESS_TOKEN", credentials.access_token.as_str()),
            ("PICKR_ACCESS_TOKEN_SECRET", credentials.access_token_secret.as_str()),
        ];
        match run_command(&self.command, text, &env) {
            Ok(CommandOutcome::Success(id)) if id.is_empty() => {
                Err(PublishError::Transport("publish command printed no post id".to_string()))
            }
            Ok(CommandOutcome::Success(id)) => Ok(id),
            Ok(CommandOutcome::Failed { code: Some(EXIT_RATE_LIMITED), .. }) => Err(PublishError::RateLimited),
            Ok(CommandOutcome::Failed { code: Some(EXIT_UNAUTHORIZED), stderr }) => Err(PublishError::Unauthorized(stderr)),
            Ok(CommandOutcome::Failed { code: Some(EXIT_BAD_CONTENT), stderr }) => Err(PublishError::BadContent(stderr)),
            Ok(CommandOutcome::Failed { code, stderr }) => Err(PublishError::Transport(format!(
                "publish command exited with {}: {}",
                code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
                stderr
            ))),
            Err(e) => Err(PublishError::Transport(e.to_string())),
        }
    }
}

/// Logs instead of posting
pub struct DryRunPublisher;

impl Publisher for DryRunPublisher {
    fn publish(&self, _credentials: &Credentials, text: &str) -> Result<String, PublishError> {
        let id = format!("dry-run-{}", uuid::Uuid::new_v4());
        info!(post_id = %id, chars = text.chars().count(), "dry run publish");
        Ok(id)
    }
}

// ============================================================================
// Send bookkeeping
// ============================================================================

impl Database {
    /// Committed, unposted sends due strictly before `now`, by user then time.
    ///
    /// With `max_failures` above zero, sends that failed that many times are
    /// left out.
    pub fn due_sends(&self, now: DateTime<Utc>, max_failures: i32) -> Result<Vec<CommittedSend>, DbError> {
        let mut conn = self.get_conn()?;
        let cutoff = format_ts(now);
        let mut query = committed_sends::table
            .filter(committed_sends::posted_at.is_null())
            .filter(committed_sends::scheduled_for.lt(cutoff.as_str()))
            .order((
                committed_sends::user_id.asc(),
                committed_sends::scheduled_for.asc(),
                committed_sends::id.asc(),
            ))
            .into_boxed();
        if max_failures > 0 {
            query = query.filter(committed_sends::failures.lt(max_failures));
        }
        Ok(query.load::<CommittedSend>(&mut conn)?)
    }

    /// Record a publish. Only an unposted row is updated; returns whether
    /// this call was the one that set it.
    pub fn mark_posted(&self, send_id: i32, posted_at: DateTime<Utc>, platform_post_id: &str) -> Result<bool, DbError> {
        let mut conn = self.get_conn()?;
        let posted_at = format_ts(posted_at);
        let updated = diesel::update(
            committed_sends::table
                .filter(committed_sends::id.eq(send_id))
                .filter(committed_sends::posted_at.is_null()),
        )
        .set((
            committed_sends::posted_at.eq(Some(posted_at.as_str())),
            committed_sends::platform_post_id.eq(Some(platform_post_id)),
        ))
        .execute(&mut conn)?;
        Ok(updated == 1)
    }

    /// Count a failed publish attempt against a send
    pub fn record_failure(&self, send_id: i32, message: &str) -> Result<(), DbError> {
        let mut conn = self.get_conn()?;
        diesel::update(
            committed_sends::table
                .filter(committed_sends::id.eq(send_id))
                .filter(committed_sends::posted_at.is_null()),
        )
        .set((
            committed_sends::failures.eq(committed_sends::failures + 1),
            committed_sends::last_error.eq(Some(message)),
        ))
        .execute(&mut conn)?;
        Ok(())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// What one dispatch run did
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct DispatchReport {
    /// Sends that were due
    pub due: usize,
    /// Users with due sends
    pub users: usize,
    pub posted: usize,
    /// Publishes that were rejected
    pub failed: usize,
    /// Users skipped for missing or incomplete credentials
    pub skipped_users: usize,
    /// Sends left for the next run after their user's publish failed
    pub deferred: usize,
    /// Publishes that could not be recorded
    pub unrecorded: usize,
}

pub struct Dispatcher<'a> {
    db: &'a Database,
    publisher: &'a dyn Publisher,
    credentials: &'a dyn CredentialStore,
    tone: Option<&'a ToneGate<'a>>,
    max_failures: i32,
}

impl<'a> Dispatcher<'a> {
    pub fn new(db: &'a Database, publisher: &'a dyn Publisher, credentials: &'a dyn CredentialStore) -> Self {
        Self { db, publisher, credentials, tone: None, max_failures: 0 }
    }

    /// Rewrite drafts in the user's voice right before they go out
    pub fn with_tone(mut self, gate: &'a ToneGate<'a>) -> Self {
        self.tone = Some(gate);
        self
    }

    /// Stop retrying a send after this many failures; 0 retries forever
    pub fn with_max_failures(mut self, max_failures: i32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Publish every send due before `now`.
    ///
    /// Only failing to read the due sends is an error. Everything after
    /// that is logged and counted in the report.
    pub fn dispatch_due(&self, now: DateTime<Utc>) -> Result<DispatchReport, DbError> {
        let due = self.db.due_sends(now, self.max_failures)?;
        let mut report = DispatchReport { due: due.len(), ..DispatchReport::default() };
        if due.is_empty() {
            debug!("nothing due");
            return Ok(report);
        }

        let mut start = 0;
        while start < due.len() {
            let user_id = &due[start].user_id;
            let end = due[start..]
                .iter()
                .position(|s| &s.user_id != user_id)
                .map_or(due.len(), |n| start + n);
            report.users += 1;
            self.dispatch_user(&due[start..end], now, &mut report);
            start = end;
        }

        info!(
            due = report.due,
            posted = report.posted,
            failed = report.failed,
            skipped_users = report.skipped_users,
            deferred = report.deferred,
            "dispatch finished"
        );
        Ok(report)
    }

    fn dispatch_user(&self, sends: &[CommittedSend], now: DateTime<Utc>, report: &mut DispatchReport) {
        let Some(first) = sends.first() else {
            return;
        };
        let user_id = first.user_id.as_str();

        let credentials = match self.credentials.credentials_for(user_id) {
            Ok(Some(creds)) if creds.is_complete() => creds,
            Ok(_) => {
                warn!(user_id, pending = sends.len(), "no usable credentials, skipping user");
                report.skipped_users += 1;
                return;
            }
            Err(e) => {
                error!(user_id, error = %e, "could not load credentials, skipping user");
                report.skipped_users += 1;
                return;
            }
        };

        let user = match self.tone {
            Some(_) => match self.db.get_user(user_id) {
                Ok(user) => user,
                Err(e) => {
                    warn!(user_id, error = %e, "could not load user, sending without tone edits");
                    None
                }
            },
            None => None,
        };

        for (i, send) in sends.iter().enumerate() {
            if let (Some(gate), Some(user)) = (self.tone, user.as_ref()) {
                match self.db.get_draft(&send.draft_post_id) {
                    Ok(draft) => {
                        if let Err(e) = gate.ensure(self.db, user, &draft) {
                            warn!(user_id, send_id = send.id, error = %e, "tone gate failed");
                        }
                    }
                    Err(e) => warn!(user_id, send_id = send.id, error = %e, "could not load draft"),
                }
            }

            let remaining = sends.len() - i - 1;
            let text = match self.db.effective_text(&send.draft_post_id, user_id) {
                Ok(text) => text,
                Err(e) => {
                    error!(user_id, send_id = send.id, error = %e, deferred = remaining, "could not resolve post text, deferring user's remaining posts");
                    report.failed += 1;
                    report.deferred += remaining;
                    self.record_failure(user_id, send.id, &e.to_string());
                    return;
                }
            };

            match self.publisher.publish(&credentials, &text) {
                Ok(platform_post_id) => match self.db.mark_posted(send.id, now, &platform_post_id) {
                    Ok(true) => {
                        info!(user_id, send_id = send.id, platform_post_id = %platform_post_id, "posted");
                        report.posted += 1;
                    }
                    Ok(false) => {
                        warn!(user_id, send_id = send.id, platform_post_id = %platform_post_id, "send was already marked posted");
                        report.posted += 1;
                    }
                    Err(e) => {
                        error!(user_id, send_id = send.id, platform_post_id = %platform_post_id, error = %e, deferred = remaining, "published but could not record it, deferring user's remaining posts");
                        report.unrecorded += 1;
                        report.deferred += remaining;
                        return;
                    }
                },
                Err(e) => {
                    warn!(user_id, send_id = send.id, error = %e, deferred = remaining, "publish failed, deferring user's remaining posts");
                    report.failed += 1;
                    report.deferred += remaining;
                    self.record_failure(user_id, send.id, &e.to_string());
                    return;
                }
            }
        }
    }

    fn record_failure(&self, user_id: &str, send_id: i32, message: &str) {
        if let Err(e) = self.db.record_failure(send_id, message) {
            error!(user_id, send_id, error = %e, "could not record publish failure");
        }
    }

    /// Dispatch on a fixed interval until `max_ticks` runs are done, or
    /// forever when it is `None`.
    pub fn watch(&self, interval: Duration, max_ticks: Option<u64>) {
        let mut tick: u64 = 0;
        loop {
            tick += 1;
            if let Err(e) = self.dispatch_due(Utc::now()) {
                error!(tick, error = %e, "dispatch run failed");
            }
            if max_ticks.is_some_and(|max| tick >= max) {
                break;
            }
            std::thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::tests::{now, seed_niche, seed_topic};
    use crate::commit::CommitStore;
    use crate::db::NewCommittedSend;
    use crate::tone::tests::Shouting;
    use chrono::Duration as ChronoDuration;
    use std::cell::RefCell;

    /// Records every publish; rejects one access token
    struct FakePublisher {
        calls: RefCell<Vec<(String, String)>>,
        reject_token: Option<&'static str>,
        error: PublishError,
    }

    impl FakePublisher {
        fn ok() -> Self {
            Self { calls: RefCell::new(Vec::new()), reject_token: None, error: PublishError::RateLimited }
        }

        fn rejecting(token: &'static str, error: PublishError) -> Self {
            Self { calls: RefCell::new(Vec::new()), reject_token: Some(token), error }
        }

        fn texts(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|(_, text)| text.clone()).collect()
        }
    }

    impl Publisher for FakePublisher {
        fn publish(&self, credentials: &Credentials, text: &str) -> Result<String, PublishError> {
            let mut calls = self.calls.borrow_mut();
            calls.push((credentials.access_token.clone(), text.to_string()));
            if self.reject_token == Some(credentials.access_token.as_str()) {
                return Err(self.error.clone());
            }
            Ok(format!("p-{}", calls.len()))
        }
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.add_user("u-1", "ada", None).unwrap();
        db.add_user("u-2", "bob", None).unwrap();
        seed_niche(&db, "u-1", "fitness");
        seed_niche(&db, "u-2", "fitness");
        seed_topic(&db, "fitness", "t-0", "trend", 4);
        db.add_credentials("u-1", "good", "s1").unwrap();
        db.add_credentials("u-2", "bad", "s2").unwrap();
        db
    }

    fn commit_at(db: &Database, user_id: &str, draft_id: &str, when: DateTime<Utc>) -> i32 {
        CommitStore::new(db, 0, 0).commit_new(user_id, draft_id, when, now()).unwrap()
    }

    #[test]
    fn test_due_send_from_yesterday_is_posted_once() {
        let db = seeded();
        let send_id = commit_at(&db, "u-1", "t-0-d0", now() - ChronoDuration::days(1));
        let publisher = FakePublisher::ok();
        let dispatcher = Dispatcher::new(&db, &publisher, &db);

        let report = dispatcher.dispatch_due(now()).unwrap();
        assert_eq!(report.posted, 1);
        assert_eq!(publisher.calls.borrow().len(), 1);
        assert_eq!(publisher.texts(), vec!["post 0 about t-0".to_string()]);

        let send = db.get_send(send_id).unwrap().unwrap();
        assert_eq!(send.posted_at, Some(format_ts(now())));
        assert_eq!(send.platform_post_id.as_deref(), Some("p-1"));

        // Posted rows are never published again
        let again = dispatcher.dispatch_due(now() + ChronoDuration::minutes(5)).unwrap();
        assert_eq!(again, DispatchReport::default());
        assert_eq!(publisher.calls.borrow().len(), 1);
    }

    #[test]
    fn test_unauthorized_defers_rest_of_user() {
        let db = seeded();
        let first = commit_at(&db, "u-2", "t-0-d0", now() - ChronoDuration::hours(2));
        let second = commit_at(&db, "u-2", "t-0-d1", now() - ChronoDuration::hours(1));
        let publisher = FakePublisher::rejecting("bad", PublishError::Unauthorized("token revoked".to_string()));
        let dispatcher = Dispatcher::new(&db, &publisher, &db);

        let report = dispatcher.dispatch_due(now()).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.deferred, 1);
        assert_eq!(publisher.calls.borrow().len(), 1);

        let first = db.get_send(first).unwrap().unwrap();
        let second = db.get_send(second).unwrap().unwrap();
        assert!(first.posted_at.is_none());
        assert!(second.posted_at.is_none());
        assert_eq!(first.failures, 1);
        assert_eq!(first.last_error.as_deref(), Some("unauthorized: token revoked"));
        assert_eq!(second.failures, 0);
    }

    #[test]
    fn test_unreadable_draft_defers_rest_of_user() {
        let db = seeded();
        let mut conn = db.get_conn().unwrap();
        diesel::insert_into(committed_sends::table)
            .values(&NewCommittedSend {
                user_id: "u-1",
                draft_post_id: "gone",
                calendar_id: None,
                scheduled_for: Some("2026-03-11T01:00:00Z"),
                posted_at: None,
                platform_post_id: None,
                failures: 0,
                last_error: None,
                created_at: "2026-03-10T00:00:00Z",
            })
            .execute(&mut conn)
            .unwrap();
        let broken = crate::db::last_insert_id(&mut conn).unwrap();
        drop(conn);
        let later = commit_at(&db, "u-1", "t-0-d1", now() - ChronoDuration::hours(1));

        let publisher = FakePublisher::ok();
        let report = Dispatcher::new(&db, &publisher, &db).dispatch_due(now()).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.deferred, 1);
        assert!(publisher.calls.borrow().is_empty());

        let broken = db.get_send(broken).unwrap().unwrap();
        assert_eq!(broken.failures, 1);
        assert!(broken.last_error.unwrap().contains("gone"));
        assert!(!db.get_send(later).unwrap().unwrap().is_posted());
    }

    #[test]
    fn test_unrecorded_publish_stops_user() {
        let db = seeded();
        commit_at(&db, "u-1", "t-0-d0", now() - ChronoDuration::hours(2));
        commit_at(&db, "u-1", "t-0-d1", now() - ChronoDuration::hours(1));
        let mut conn = db.get_conn().unwrap();
        diesel::sql_query(
            "CREATE TRIGGER sends_read_only BEFORE UPDATE ON committed_sends BEGIN SELECT RAISE(ABORT, 'read only'); END",
        )
        .execute(&mut conn)
        .unwrap();
        drop(conn);

        let publisher = FakePublisher::ok();
        let report = Dispatcher::new(&db, &publisher, &db).dispatch_due(now()).unwrap();
        assert_eq!(report.unrecorded, 1);
        assert_eq!(report.deferred, 1);
        assert_eq!(report.posted, 0);
        assert_eq!(publisher.calls.borrow().len(), 1);
    }

    #[test]
    fn test_one_user_failing_does_not_block_another() {
        let db = seeded();
        commit_at(&db, "u-2", "t-0-d0", now() - ChronoDuration::hours(1));
        let good = commit_at(&db, "u-1", "t-0-d1", now() - ChronoDuration::hours(1));
        let publisher = FakePublisher::rejecting("bad", PublishError::BadContent("too long".to_string()));
        let dispatcher = Dispatcher::new(&db, &publisher, &db);

        let report = dispatcher.dispatch_due(now()).unwrap();
        assert_eq!(report.users, 2);
        assert_eq!(report.posted, 1);
        assert_eq!(report.failed, 1);
        assert!(db.get_send(good).unwrap().unwrap().is_posted());
    }

    #[test]
    fn test_user_posts_go_out_in_scheduled_order() {
        let db = seeded();
        commit_at(&db, "u-1", "t-0-d2", now() - ChronoDuration::hours(1));
        commit_at(&db, "u-1", "t-0-d1", now() - ChronoDuration::hours(3));
        commit_at(&db, "u-1", "t-0-d3", now() - ChronoDuration::hours(2));
        let publisher = FakePublisher::ok();
        Dispatcher::new(&db, &publisher, &db).dispatch_due(now()).unwrap();

        assert_eq!(
            publisher.texts(),
            vec!["post 1 about t-0", "post 3 about t-0", "post 2 about t-0"]
        );
    }

    #[test]
    fn test_only_committed_past_sends_are_due() {
        let db = seeded();
        commit_at(&db, "u-1", "t-0-d0", now() + ChronoDuration::hours(1));
        // Exactly now is not yet due
        commit_at(&db, "u-1", "t-0-d1", now());
        let publisher = FakePublisher::ok();
        let report = Dispatcher::new(&db, &publisher, &db).dispatch_due(now()).unwrap();

        assert_eq!(report.due, 0);
        assert!(publisher.calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_credentials_skips_whole_user() {
        let db = seeded();
        db.add_user("u-3", "cy", None).unwrap();
        commit_at(&db, "u-3", "t-0-d0", now() - ChronoDuration::hours(1));
        commit_at(&db, "u-3", "t-0-d1", now() - ChronoDuration::hours(1));
        // Blank secret counts as missing
        db.add_credentials("u-1", "good", " ").unwrap();
        commit_at(&db, "u-1", "t-0-d2", now() - ChronoDuration::hours(1));

        let publisher = FakePublisher::ok();
        let report = Dispatcher::new(&db, &publisher, &db).dispatch_due(now()).unwrap();
        assert_eq!(report.skipped_users, 2);
        assert!(publisher.calls.borrow().is_empty());
        assert_eq!(db.due_sends(now(), 0).unwrap().len(), 3);
    }

    #[test]
    fn test_max_failures_parks_send() {
        let db = seeded();
        let send_id = commit_at(&db, "u-2", "t-0-d0", now() - ChronoDuration::hours(1));
        let publisher = FakePublisher::rejecting("bad", PublishError::Transport("connection reset".to_string()));
        let dispatcher = Dispatcher::new(&db, &publisher, &db).with_max_failures(2);

        dispatcher.dispatch_due(now()).unwrap();
        dispatcher.dispatch_due(now()).unwrap();
        let third = dispatcher.dispatch_due(now()).unwrap();

        assert_eq!(third.due, 0);
        assert_eq!(publisher.calls.borrow().len(), 2);
        assert_eq!(db.get_send(send_id).unwrap().unwrap().failures, 2);
        // Without a limit it stays due
        assert_eq!(db.due_sends(now(), 0).unwrap().len(), 1);
    }

    #[test]
    fn test_tone_gate_rewrites_before_send() {
        let db = seeded();
        db.add_user("u-4", "dee", Some("Cheerful and to the point, always. ".repeat(8).as_str())).unwrap();
        db.add_credentials("u-4", "good", "s4").unwrap();
        commit_at(&db, "u-4", "t-0-d0", now() - ChronoDuration::hours(1));

        let rewriter = Shouting::new();
        let gate = ToneGate::new(&rewriter, 200);
        let publisher = FakePublisher::ok();
        Dispatcher::new(&db, &publisher, &db).with_tone(&gate).dispatch_due(now()).unwrap();

        assert_eq!(publisher.texts(), vec!["POST 0 ABOUT T-0".to_string()]);
    }

    #[test]
    fn test_retrying_publisher_absorbs_rate_limits() {
        struct Flaky(RefCell<u32>);
        impl Publisher for Flaky {
            fn publish(&self, _: &Credentials, _: &str) -> Result<String, PublishError> {
                let mut n = self.0.borrow_mut();
                *n += 1;
                if *n < 3 { Err(PublishError::RateLimited) } else { Ok("p-9".to_string()) }
            }
        }

        let policy = RetryPolicy { max_attempts: 3, initial_backoff: Duration::ZERO, multiplier: 1.0 };
        let publisher = RetryingPublisher::new(Flaky(RefCell::new(0)), policy);
        let creds = Credentials { access_token: "t".to_string(), access_token_secret: "s".to_string() };
        assert_eq!(publisher.publish(&creds, "hi"), Ok("p-9".to_string()));
    }

    #[test]
    fn test_command_publisher_maps_exit_codes() {
        let creds = Credentials { access_token: "tok".to_string(), access_token_secret: "sec".to_string() };

        let ok = CommandPublisher::new("cat >/dev/null; printf 'id-%s' \"$PICKR_ACCESS_TOKEN\"");
        assert_eq!(ok.publish(&creds, "hello"), Ok("id-tok".to_string()));

        assert_eq!(CommandPublisher::new("exit 75").publish(&creds, "x"), Err(PublishError::RateLimited));
        assert!(matches!(CommandPublisher::new("exit 77").publish(&creds, "x"), Err(PublishError::Unauthorized(_))));
        assert!(matches!(CommandPublisher::new("exit 65").publish(&creds, "x"), Err(PublishError::BadContent(_))));
        assert!(matches!(CommandPublisher::new("exit 1").publish(&creds, "x"), Err(PublishError::Transport(_))));
        assert!(matches!(CommandPublisher::new("true").publish(&creds, "x"), Err(PublishError::Transport(_))));
    }

    #[test]
    fn test_dry_run_and_watch() {
        let db = seeded();
        // Due against the wall clock
        let send_id = commit_at(&db, "u-1", "t-0-d0", now() - ChronoDuration::days(3000));
        let publisher = DryRunPublisher;
        Dispatcher::new(&db, &publisher, &db).watch(Duration::ZERO, Some(2));

        let send = db.get_send(send_id).unwrap().unwrap();
        assert!(send.platform_post_id.unwrap().starts_with("dry-run-"));
    }
}
