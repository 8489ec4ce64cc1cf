//! Weekly schedule allocation
//!
//! Turns a user's niches and their topic pools into one week calendar:
//!
//! 1. Interleave each niche's trend and evergreen topics.
//! 2. When topics are scarce, take more drafts from every topic.
//! 3. Otherwise go round-robin across niches, one topic at a time, so a
//!    single busy niche cannot fill the week.
//! 4. Tone-gate the selected drafts.
//! 5. Place them day by day over the anchor hours, each placement backed by
//!    a suggested send.

use crate::calendar::{iso_week_of, slot_time, summary_text};
use crate::config::ScheduleConfig;
use crate::db::{format_ts, last_insert_id, Database, DbError, DraftPost, NewCommittedSend, NewDraftSlot, NewWeekCalendar, Topic, User};
use crate::schema::{committed_sends, draft_slots, week_calendars};
use crate::tone::ToneGate;
use crate::topic_pool::{CandidateTopic, TopicPool};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// A draft picked for the week and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDraft {
    pub niche_id: String,
    pub topic_id: String,
    pub draft: DraftPost,
}

/// The selection made before anything is written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeekPlan {
    /// Drafts in placement order, at most the weekly budget
    pub drafts: Vec<PlannedDraft>,
    /// Topics that contributed at least one draft, first use first
    pub topics: Vec<Topic>,
    /// Whether the scarce-topic quota was used
    pub fallback: bool,
    /// Drafts taken per topic
    pub quota: usize,
}

impl WeekPlan {
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

fn take_drafts<R: Rng + ?Sized>(candidate: &CandidateTopic, niche_id: &str, quota: usize, rng: &mut R) -> Vec<PlannedDraft> {
    let mut drafts = candidate.drafts.clone();
    drafts.shuffle(rng);
    drafts.truncate(quota);
    drafts
        .into_iter()
        .map(|draft| PlannedDraft {
            niche_id: niche_id.to_string(),
            topic_id: candidate.topic.id.clone(),
            draft,
        })
        .collect()
}

/// Select the week's drafts from per-niche pools.
///
/// Pure apart from `rng`, which only decides which drafts of a topic are
/// used. The result never holds more than `budget` drafts.
pub fn plan_week<R: Rng + ?Sized>(pools: Vec<TopicPool>, budget: usize, posts_per_topic: usize, rng: &mut R) -> WeekPlan {
    let mut queues: Vec<(String, VecDeque<CandidateTopic>)> = pools
        .into_iter()
        .map(|pool| (pool.niche_id.clone(), VecDeque::from(pool.interleaved())))
        .filter(|(_, topics)| !topics.is_empty())
        .collect();

    let candidates: usize = queues.iter().map(|(_, q)| q.len()).sum();
    if candidates == 0 || budget == 0 {
        return WeekPlan { quota: posts_per_topic, ..WeekPlan::default() };
    }

    let mut plan = WeekPlan::default();
    let mut used: Vec<&Topic> = Vec::new();
    let mut picked: Vec<(PlannedDraft, Topic)> = Vec::new();

    if candidates * posts_per_topic < budget {
        plan.fallback = true;
        plan.quota = budget.div_ceil(candidates);
        for (niche_id, queue) in &queues {
            for candidate in queue {
                for draft in take_drafts(candidate, niche_id, plan.quota, rng) {
                    picked.push((draft, candidate.topic.clone()));
                }
            }
        }
    } else {
        plan.quota = posts_per_topic;
        'rounds: loop {
            let mut progressed = false;
            for (niche_id, queue) in queues.iter_mut() {
                let Some(candidate) = queue.pop_front() else {
                    continue;
                };
                progressed = true;
                for draft in take_drafts(&candidate, niche_id, plan.quota, rng) {
                    picked.push((draft, candidate.topic.clone()));
                }
                if picked.len() >= budget {
                    break 'rounds;
                }
            }
            if !progressed {
                break;
            }
        }
    }

    picked.truncate(budget);
    for (_, topic) in &picked {
        if !used.iter().any(|t| t.id == topic.id) {
            used.push(topic);
        }
    }
    plan.topics = used.into_iter().cloned().collect();
    plan.drafts = picked.into_iter().map(|(draft, _)| draft).collect();
    plan
}

/// Why no calendar was written for a user
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoNiches,
    NoCandidates,
    AlreadyScheduled { calendar_id: i32 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoNiches => write!(f, "no active niches"),
            SkipReason::NoCandidates => write!(f, "no recent topics with drafts"),
            SkipReason::AlreadyScheduled { calendar_id } => {
                write!(f, "already scheduled this week (calendar {})", calendar_id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    Created {
        calendar_id: i32,
        iso_year: i32,
        week: u32,
        slots: usize,
        committed: usize,
        fallback: bool,
    },
    Skipped { reason: SkipReason },
}

/// Totals of one `schedule_all` run
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    pub created: usize,
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

pub struct ScheduleAllocator<'a> {
    db: &'a Database,
    settings: &'a ScheduleConfig,
    tone: Option<&'a ToneGate<'a>>,
}

impl<'a> ScheduleAllocator<'a> {
    pub fn new(db: &'a Database, settings: &'a ScheduleConfig) -> Self {
        Self { db, settings, tone: None }
    }

    pub fn with_tone(mut self, gate: &'a ToneGate<'a>) -> Self {
        self.tone = Some(gate);
        self
    }

    /// Build and store this week's calendar for `user`.
    ///
    /// Always writes a new calendar when there is something to place. With
    /// no niches or no eligible topics nothing is written.
    pub fn create_schedule<R: Rng + ?Sized>(&self, user: &User, now: DateTime<Utc>, rng: &mut R) -> Result<ScheduleOutcome, DbError> {
        let niches = self.db.niches_for_user(&user.id)?;
        if niches.is_empty() {
            info!(user_id = %user.id, "no active niches, skipping schedule");
            return Ok(ScheduleOutcome::Skipped { reason: SkipReason::NoNiches });
        }

        let mut pools = Vec::with_capacity(niches.len());
        for niche in &niches {
            let pool = self.db.topic_pool(&niche.id, self.settings.recency_days, now)?;
            debug!(user_id = %user.id, niche = %niche.title, trend = pool.trend.len(), evergreen = pool.evergreen.len(), "topic pool");
            pools.push(pool);
        }

        let anchors = self.settings.anchor_hours();
        let budget = self.settings.weekly_budget();
        let plan = plan_week(pools, budget, self.settings.posts_per_topic, rng);
        if plan.is_empty() {
            info!(user_id = %user.id, "no candidate topics, skipping schedule");
            return Ok(ScheduleOutcome::Skipped { reason: SkipReason::NoCandidates });
        }

        if let Some(gate) = self.tone {
            for planned in &plan.drafts {
                gate.ensure(self.db, user, &planned.draft)?;
            }
        }

        let (iso_year, week) = iso_week_of(now, self.settings.utc_offset_minutes);
        let summary = summary_text(week, &plan.topics);
        let created_at = format_ts(now);
        let offset = self.settings.utc_offset_minutes;
        let auto_accept = self.settings.auto_accept;

        let (calendar_id, slots, committed) = self.db.transaction(|conn| -> Result<(i32, usize, usize), DbError> {
            diesel::insert_into(week_calendars::table)
                .values(&NewWeekCalendar {
                    user_id: &user.id,
                    iso_year,
                    week_number: week as i32,
                    summary: &summary,
                    created_at: &created_at,
                })
                .execute(conn)?;
            let calendar_id = last_insert_id(conn)?;

            let cells = (0..7u32).flat_map(|day| anchors.iter().map(move |hour| (day, *hour)));
            let mut slots = 0;
            let mut committed = 0;
            for ((day, hour), planned) in cells.zip(plan.drafts.iter()) {
                let scheduled_for = auto_accept
                    .then(|| slot_time(iso_year, week, day, hour, offset))
                    .flatten()
                    .filter(|at| *at > now)
                    .map(format_ts);
                if scheduled_for.is_some() {
                    committed += 1;
                }

                diesel::insert_into(committed_sends::table)
                    .values(&NewCommittedSend {
                        user_id: &user.id,
                        draft_post_id: &planned.draft.id,
                        calendar_id: Some(calendar_id),
                        scheduled_for: scheduled_for.as_deref(),
                        posted_at: None,
                        platform_post_id: None,
                        failures: 0,
                        last_error: None,
                        created_at: &created_at,
                    })
                    .execute(conn)?;
                let send_id = last_insert_id(conn)?;

                diesel::insert_into(draft_slots::table)
                    .values(&NewDraftSlot {
                        calendar_id,
                        weekday: day as i32,
                        hour: hour as i32,
                        draft_post_id: &planned.draft.id,
                        send_id: Some(send_id),
                    })
                    .execute(conn)?;
                slots += 1;
            }
            Ok((calendar_id, slots, committed))
        })?;

        info!(
            user_id = %user.id,
            calendar_id,
            week,
            slots,
            committed,
            fallback = plan.fallback,
            "created week calendar"
        );
        Ok(ScheduleOutcome::Created {
            calendar_id,
            iso_year,
            week,
            slots,
            committed,
            fallback: plan.fallback,
        })
    }

    /// Schedule the week of `now` for one user, unless a calendar for that
    /// week already exists and `force` is not set.
    pub fn schedule_user<R: Rng + ?Sized>(&self, user: &User, now: DateTime<Utc>, force: bool, rng: &mut R) -> Result<ScheduleOutcome, DbError> {
        if !force {
            if let Some(calendar_id) = self.existing_calendar(user, now)? {
                debug!(user_id = %user.id, calendar_id, "already scheduled");
                return Ok(ScheduleOutcome::Skipped { reason: SkipReason::AlreadyScheduled { calendar_id } });
            }
        }
        self.create_schedule(user, now, rng)
    }

    /// Schedule the current week for every user.
    ///
    /// One user's failure never stops the others.
    pub fn schedule_all<R: Rng + ?Sized>(&self, now: DateTime<Utc>, force: bool, rng: &mut R) -> Result<ScheduleReport, DbError> {
        let mut report = ScheduleReport::default();

        for user in self.db.get_all_users()? {
            match self.schedule_user(&user, now, force, rng) {
                Ok(ScheduleOutcome::Created { .. }) => report.created += 1,
                Ok(ScheduleOutcome::Skipped { .. }) => report.skipped += 1,
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "schedule failed");
                    report.failed.push((user.id.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Whether `user` already has a calendar for the week of `now`
    pub fn existing_calendar(&self, user: &User, now: DateTime<Utc>) -> Result<Option<i32>, DbError> {
        let (iso_year, week) = iso_week_of(now, self.settings.utc_offset_minutes);
        Ok(self.db.latest_calendar(&user.id, iso_year, week)?.map(|c| c.id))
    }
}
