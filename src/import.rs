//! Import upstream records from a JSON bundle
//!
//! Topic discovery and draft generation run elsewhere. Their output comes
//! in as one bundle of niches, users and topics with drafts:
//!
//! ```json
//! {
//!   "niches": [{ "title": "running" }],
//!   "users": [{
//!     "id": "u-1", "username": "ada", "niches": ["running"],
//!     "tone_sample": "...",
//!     "credentials": { "access_token": "...", "access_token_secret": "..." }
//!   }],
//!   "topics": [{
//!     "id": "t-1", "niche": "running", "name": "tempo runs",
//!     "source": "trend", "size": 42, "engagement": [3, 5, 9],
//!     "drafts": [{ "id": "d-1", "text": "...", "category": "informative" }]
//!   }]
//! }
//! ```
//!
//! Records whose id already exists are left alone.

use crate::db::{format_ts, parse_ts, topic_sources, Database, DbError, NewCredentials, NewDraftPost, NewNiche, NewTopic, NewUser, NewUserNiche};
use crate::schema::{draft_posts, niches, platform_credentials, topics, user_niches, users};
use crate::trend::{rank_trend, TrendRank};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse bundle: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid bundle: {0}")]
    Invalid(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<diesel::result::Error> for ImportError {
    fn from(e: diesel::result::Error) -> Self {
        ImportError::Db(DbError::Query(e))
    }
}

#[derive(Debug, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub niches: Vec<NicheRecord>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub topics: Vec<TopicRecord>,
}

#[derive(Debug, Deserialize)]
pub struct NicheRecord {
    pub id: Option<String>,
    pub title: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub tone_sample: Option<String>,
    /// Niche titles
    #[serde(default)]
    pub niches: Vec<String>,
    pub credentials: Option<CredentialRecord>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    pub access_token_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct TopicRecord {
    pub id: String,
    /// Niche title
    pub niche: String,
    pub name: String,
    pub description: Option<String>,
    pub source: String,
    #[serde(default)]
    pub size: i32,
    pub rank: Option<i32>,
    /// Engagement counts per period, oldest first; ranks the topic when
    /// `rank` is absent
    pub engagement: Option<Vec<f64>>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub drafts: Vec<DraftRecord>,
}

#[derive(Debug, Deserialize)]
pub struct DraftRecord {
    pub id: String,
    pub text: String,
    pub category: Option<String>,
}

impl TopicRecord {
    /// Given rank, else the engagement trend, else unranked
    pub fn effective_rank(&self) -> i32 {
        match (self.rank, &self.engagement) {
            (Some(rank), _) => rank,
            (None, Some(series)) => rank_trend(series).as_i32(),
            (None, None) => TrendRank::Unranked.as_i32(),
        }
    }
}

/// Rows newly written by an import
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ImportSummary {
    pub niches: usize,
    pub users: usize,
    pub topics: usize,
    pub drafts: usize,
    pub credentials: usize,
}

impl Bundle {
    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ImportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn validate(&self) -> Result<(), ImportError> {
        for user in &self.users {
            if user.id.trim().is_empty() || user.username.trim().is_empty() {
                return Err(ImportError::Invalid("users need an id and a username".to_string()));
            }
        }
        for topic in &self.topics {
            if topic.id.trim().is_empty() {
                return Err(ImportError::Invalid(format!("topic '{}' has no id", topic.name)));
            }
            if !topic_sources::is_valid(&topic.source) {
                return Err(ImportError::Invalid(format!(
                    "topic {} has unknown source '{}' (expected '{}' or '{}')",
                    topic.id,
                    topic.source,
                    topic_sources::TREND,
                    topic_sources::EVERGREEN
                )));
            }
            if let Some(rank) = topic.rank {
                if !(TrendRank::Hot.as_i32()..=TrendRank::Unranked.as_i32()).contains(&rank) {
                    return Err(ImportError::Invalid(format!(
                        "topic {} has rank {} (expected {} to {})",
                        topic.id,
                        rank,
                        TrendRank::Hot.as_i32(),
                        TrendRank::Unranked.as_i32()
                    )));
                }
            }
            if let Some(raw) = &topic.created_at {
                if parse_ts(raw).is_none() {
                    return Err(ImportError::Invalid(format!("topic {} has a bad created_at '{}'", topic.id, raw)));
                }
            }
            if topic.drafts.iter().any(|d| d.id.trim().is_empty()) {
                return Err(ImportError::Invalid(format!("topic {} has a draft without an id", topic.id)));
            }
        }
        Ok(())
    }
}

/// Id of the niche titled `title`
fn resolve_niche(conn: &mut SqliteConnection, title: &str, known: &mut HashMap<String, String>) -> Result<String, ImportError> {
    if let Some(id) = known.get(title) {
        return Ok(id.clone());
    }
    let existing = niches::table
        .filter(niches::title.eq(title))
        .select(niches::id)
        .first::<String>(conn)
        .optional()?;
    let id = existing.ok_or_else(|| ImportError::Invalid(format!("unknown niche '{}'", title)))?;
    known.insert(title.to_string(), id.clone());
    Ok(id)
}

impl Database {
    /// Write a bundle in one transaction
    pub fn import_bundle(&self, bundle: &Bundle, now: DateTime<Utc>) -> Result<ImportSummary, ImportError> {
        bundle.validate()?;
        let now_ts = format_ts(now);

        let summary = self.transaction(|conn| -> Result<ImportSummary, ImportError> {
            let mut summary = ImportSummary::default();
            let mut known: HashMap<String, String> = HashMap::new();

            for niche in &bundle.niches {
                let id = niche.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                summary.niches += diesel::insert_or_ignore_into(niches::table)
                    .values(&NewNiche { id: &id, title: &niche.title, is_active: niche.active })
                    .execute(conn)?;
                // The title may already belong to an older niche
                resolve_niche(conn, &niche.title, &mut known)?;
            }

            for user in &bundle.users {
                summary.users += diesel::insert_or_ignore_into(users::table)
                    .values(&NewUser {
                        id: &user.id,
                        username: &user.username,
                        tone_sample: user.tone_sample.as_deref(),
                        created_at: &now_ts,
                    })
                    .execute(conn)?;

                for title in &user.niches {
                    let niche_id = resolve_niche(conn, title, &mut known)?;
                    diesel::insert_or_ignore_into(user_niches::table)
                        .values(&NewUserNiche { user_id: &user.id, niche_id: &niche_id })
                        .execute(conn)?;
                }

                if let Some(creds) = &user.credentials {
                    let latest = platform_credentials::table
                        .filter(platform_credentials::user_id.eq(user.id.as_str()))
                        .order(platform_credentials::id.desc())
                        .select((platform_credentials::access_token, platform_credentials::access_token_secret))
                        .first::<(String, String)>(conn)
                        .optional()?;
                    let unchanged = latest.is_some_and(|(token, secret)| {
                        token == creds.access_token && secret == creds.access_token_secret
                    });
                    if !unchanged {
                        summary.credentials += diesel::insert_into(platform_credentials::table)
                            .values(&NewCredentials {
                                user_id: &user.id,
                                access_token: &creds.access_token,
                                access_token_secret: &creds.access_token_secret,
                                created_at: &now_ts,
                            })
                            .execute(conn)?;
                    }
                }
            }

            for topic in &bundle.topics {
                let niche_id = resolve_niche(conn, &topic.niche, &mut known)?;
                let created_at = topic
                    .created_at
                    .as_deref()
                    .and_then(parse_ts)
                    .map(format_ts)
                    .unwrap_or_else(|| now_ts.clone());
                let rank = topic.effective_rank();
                debug!(topic_id = %topic.id, rank, "importing topic");

                summary.topics += diesel::insert_or_ignore_into(topics::table)
                    .values(&NewTopic {
                        id: &topic.id,
                        niche_id: &niche_id,
                        name: &topic.name,
                        description: topic.description.as_deref(),
                        source: &topic.source,
                        size: topic.size,
                        rank,
                        created_at: &created_at,
                    })
                    .execute(conn)?;

                for draft in &topic.drafts {
                    summary.drafts += diesel::insert_or_ignore_into(draft_posts::table)
                        .values(&NewDraftPost {
                            id: &draft.id,
                            topic_id: &topic.id,
                            text: &draft.text,
                            category: draft.category.as_deref(),
                        })
                        .execute(conn)?;
                }
            }

            Ok(summary)
        })?;

        info!(
            niches = summary.niches,
            users = summary.users,
            topics = summary.topics,
            drafts = summary.drafts,
            credentials = summary.credentials,
            "imported bundle"
        );
        Ok(summary)
    }

    /// Read and import a bundle file
    pub fn import_file(&self, path: &Path, now: DateTime<Utc>) -> Result<ImportSummary, ImportError> {
        let bundle = Bundle::from_path(path)?;
        self.import_bundle(&bundle, now)
    }
}
