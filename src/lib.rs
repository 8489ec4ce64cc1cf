//! pickr - weekly post scheduling and dispatch
//!
//! Turns generated draft posts into a weekly calendar of suggested posting
//! slots, lets a user commit slots to real send times, and publishes the
//! committed posts when they come due.
//!
//! # Pipeline
//!
//! | Stage | Module | What it does |
//! |-------|--------|--------------|
//! | rank | [`trend`] | Classifies an engagement series into a trend rank |
//! | pool | [`topic_pool`] | Recent topics of a niche, by source category |
//! | allocate | [`allocator`] | Picks and places drafts over the week |
//! | tone | [`tone`] | Rewrites drafts in the user's voice, once |
//! | commit | [`commit`] | Binds a slot to a send time, or takes it back |
//! | dispatch | [`dispatch`] | Publishes due sends, user by user |
//!
//! # Quick Start
//!
//! ```no_run
//! use pickr::{Config, Database, ScheduleAllocator};
//!
//! let db = Database::new("pickr.db").unwrap();
//! let config = Config::default();
//!
//! let allocator = ScheduleAllocator::new(&db, &config.schedule);
//! let report = allocator
//!     .schedule_all(chrono::Utc::now(), false, &mut rand::rng())
//!     .unwrap();
//! println!("created {} calendars", report.created);
//! ```

pub mod allocator;
pub mod calendar;
pub mod commit;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod external;
pub mod import;
pub mod init;
pub mod logging;
pub mod retry;
pub mod schema;
pub mod tone;
pub mod topic_pool;
pub mod trend;

pub use allocator::{plan_week, ScheduleAllocator, ScheduleOutcome, ScheduleReport, SkipReason, WeekPlan};
pub use calendar::{CalendarView, SlotStatus, SlotView};
pub use commit::{CommitError, CommitStore};
pub use config::{Config, ConfigError};
pub use db::{
    CommittedSend, Database, DbError, DbSummary, DraftPost, DraftSlot, Niche, Topic, ToneEdit, User, WeekCalendar,
    CURRENT_SCHEMA,
};
pub use dispatch::{
    CommandPublisher, CredentialStore, Credentials, DispatchReport, Dispatcher, DryRunPublisher, PublishError,
    Publisher, RetryingPublisher,
};
pub use import::{Bundle, ImportError, ImportSummary};
pub use retry::{RateLimited, RetryPolicy};
pub use tone::{CommandRewriter, RetryingRewriter, RewriteError, Rewriter, ToneGate, ToneOutcome};
pub use topic_pool::{CandidateTopic, TopicPool};
pub use trend::{rank_trend, TrendRank};
