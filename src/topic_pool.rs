//! Per-niche topic pools
//!
//! Gathers the topics a niche produced inside a recency window, split by
//! source category, each category biggest first.

use crate::db::{format_ts, topic_sources, Database, DraftPost, Result, Topic};
use crate::schema::{draft_posts, topics};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use std::collections::HashMap;

/// A topic together with the drafts generated for it
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTopic {
    pub topic: Topic,
    pub drafts: Vec<DraftPost>,
}

/// Eligible topics for one niche, by source category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicPool {
    pub niche_id: String,
    pub trend: Vec<CandidateTopic>,
    pub evergreen: Vec<CandidateTopic>,
}

impl TopicPool {
    pub fn len(&self) -> usize {
        self.trend.len() + self.evergreen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alternate the two categories pairwise, then append whatever is left
    /// of the longer one, so neither category dominates the niche.
    pub fn interleaved(self) -> Vec<CandidateTopic> {
        interleave(self.trend, self.evergreen)
    }
}

/// `a[0], b[0], a[1], b[1], ...` followed by the tail of the longer list
pub fn interleave<T>(a: Vec<T>, b: Vec<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    loop {
        match (a.next(), b.next()) {
            (None, None) => break,
            (x, y) => out.extend(x.into_iter().chain(y)),
        }
    }
    out
}

impl Database {
    /// Topics for `niche_id` created within `window_days` of `now`.
    ///
    /// Topics without any drafts are not eligible. Empty categories come
    /// back as empty lists.
    pub fn topic_pool(&self, niche_id: &str, window_days: i64, now: DateTime<Utc>) -> Result<TopicPool> {
        let mut conn = self.get_conn()?;
        let since = format_ts(now - Duration::days(window_days));

        let recent = topics::table
            .filter(topics::niche_id.eq(niche_id))
            .filter(topics::created_at.ge(since.as_str()))
            .order((topics::size.desc(), topics::rank.asc(), topics::id.asc()))
            .load::<Topic>(&mut conn)?;

        let topic_ids: Vec<&str> = recent.iter().map(|t| t.id.as_str()).collect();
        let mut drafts_by_topic: HashMap<String, Vec<DraftPost>> = HashMap::new();
        for draft in draft_posts::table
            .filter(draft_posts::topic_id.eq_any(topic_ids))
            .order(draft_posts::id.asc())
            .load::<DraftPost>(&mut conn)?
        {
            drafts_by_topic.entry(draft.topic_id.clone()).or_default().push(draft);
        }

        let mut pool = TopicPool {
            niche_id: niche_id.to_string(),
            ..TopicPool::default()
        };
        for topic in recent {
            let Some(drafts) = drafts_by_topic.remove(&topic.id) else {
                continue;
            };
            let candidate = CandidateTopic { topic, drafts };
            if candidate.topic.source == topic_sources::TREND {
                pool.trend.push(candidate);
            } else {
                pool.evergreen.push(candidate);
            }
        }

        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewDraftPost, NewNiche, NewTopic};
    use crate::schema::niches;

    fn seed_topic(db: &Database, id: &str, source: &str, size: i32, created_at: &str, drafts: usize) {
        let mut conn = db.get_conn().unwrap();
        diesel::insert_into(topics::table)
            .values(&NewTopic {
                id,
                niche_id: "n-1",
                name: id,
                description: None,
                source,
                size,
                rank: 5,
                created_at,
            })
            .execute(&mut conn)
            .unwrap();
        for i in 0..drafts {
            let draft_id = format!("{}-d{}", id, i);
            diesel::insert_into(draft_posts::table)
                .values(&NewDraftPost { id: &draft_id, topic_id: id, text: "text", category: None })
                .execute(&mut conn)
                .unwrap();
        }
    }

    fn seeded() -> (Database, DateTime<Utc>) {
        let db = Database::open_in_memory().unwrap();
        let mut conn = db.get_conn().unwrap();
        diesel::insert_into(niches::table)
            .values(&NewNiche { id: "n-1", title: "fitness", is_active: true })
            .execute(&mut conn)
            .unwrap();
        drop(conn);
        let now = DateTime::parse_from_rfc3339("2026-03-10T12:00:00Z").unwrap().with_timezone(&Utc);
        (db, now)
    }

    #[test]
    fn test_interleave_keeps_tail() {
        assert_eq!(interleave(vec![1, 3], vec![2, 4, 6, 8]), vec![1, 2, 3, 4, 6, 8]);
        assert_eq!(interleave(Vec::<i32>::new(), vec![5, 7]), vec![5, 7]);
        assert!(interleave(Vec::<i32>::new(), Vec::new()).is_empty());
    }

    #[test]
    fn test_pool_splits_and_orders_by_size() {
        let (db, now) = seeded();
        seed_topic(&db, "small-trend", topic_sources::TREND, 5, "2026-03-09T00:00:00Z", 2);
        seed_topic(&db, "big-trend", topic_sources::TREND, 50, "2026-03-08T00:00:00Z", 2);
        seed_topic(&db, "green", topic_sources::EVERGREEN, 10, "2026-03-07T00:00:00Z", 3);

        let pool = db.topic_pool("n-1", 7, now).unwrap();
        let trend: Vec<&str> = pool.trend.iter().map(|c| c.topic.id.as_str()).collect();
        assert_eq!(trend, vec!["big-trend", "small-trend"]);
        assert_eq!(pool.evergreen.len(), 1);
        assert_eq!(pool.evergreen[0].drafts.len(), 3);
    }

    #[test]
    fn test_pool_excludes_stale_and_draftless_topics() {
        let (db, now) = seeded();
        seed_topic(&db, "stale", topic_sources::TREND, 99, "2026-02-01T00:00:00Z", 2);
        seed_topic(&db, "empty", topic_sources::EVERGREEN, 99, "2026-03-09T00:00:00Z", 0);

        let pool = db.topic_pool("n-1", 7, now).unwrap();
        assert!(pool.is_empty());
        assert!(pool.interleaved().is_empty());
    }
}
