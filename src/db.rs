//! SQLite database with Diesel ORM
//!
//! Stores upstream topics and drafts, the weekly calendars built from them,
//! and the committed sends the dispatcher works through.

use crate::schema::*;
use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use std::path::Path;
use thiserror::Error;

/// Walk up directory tree to find .pickr folder (like git finds .git)
/// Can be overridden with PICKR_DB_PATH env var
fn get_db_path() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("PICKR_DB_PATH") {
        return std::path::PathBuf::from(path);
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let mut dir = current_dir.as_path();
        loop {
            let pickr_dir = dir.join(".pickr");
            if pickr_dir.exists() && pickr_dir.is_dir() {
                return pickr_dir.join("pickr.db");
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    std::path::PathBuf::from(".pickr/pickr.db")
}

/// Current schema version for pickr
pub const CURRENT_SCHEMA: StoreSchema = StoreSchema {
    major: 1,
    minor: 1,
    patch: 0,
    name: "weekly-schedule",
    features: &[
        "topics",
        "draft_posts",
        "tone_edits",
        "week_calendars",
        "draft_slots",
        "committed_sends",
        "platform_credentials",
    ],
};

/// Describes the version and capabilities of the schema
#[derive(Debug, Clone)]
pub struct StoreSchema {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub name: &'static str,
    pub features: &'static [&'static str],
}

impl StoreSchema {
    pub fn version_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(&feature)
    }
}

impl std::fmt::Display for StoreSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{} ({})", self.version_string(), self.name)
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Format a UTC instant the way every timestamp column stores it.
///
/// Second precision with a `Z` suffix keeps lexicographic order equal to
/// chronological order, which the due-send query relies on.
pub fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp back into UTC
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Source categories a topic can come from
pub mod topic_sources {
    /// Externally sourced, currently trending subjects
    pub const TREND: &str = "trend";
    /// Internally clustered subjects that perform consistently
    pub const EVERGREEN: &str = "evergreen";

    pub fn is_valid(source: &str) -> bool {
        matches!(source, TREND | EVERGREEN)
    }
}

// ============================================================================
// Diesel Models
// ============================================================================

/// Insertable schema version
#[derive(Insertable)]
#[diesel(table_name = schema_versions)]
pub struct NewSchemaVersion<'a> {
    pub version: &'a str,
    pub name: &'a str,
    pub features: &'a str,
    pub introduced_at: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub tone_sample: Option<&'a str>,
    pub created_at: &'a str,
}

/// A product user with an optional writing sample for tone matching
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub username: String,
    pub tone_sample: Option<String>,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = niches)]
pub struct NewNiche<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub is_active: bool,
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, serde::Serialize)]
#[diesel(table_name = niches)]
pub struct Niche {
    pub id: String,
    pub title: String,
    pub is_active: bool,
}

#[derive(Insertable)]
#[diesel(table_name = user_niches)]
pub struct NewUserNiche<'a> {
    pub user_id: &'a str,
    pub niche_id: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = topics)]
pub struct NewTopic<'a> {
    pub id: &'a str,
    pub niche_id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub source: &'a str,
    pub size: i32,
    pub rank: i32,
    pub created_at: &'a str,
}

/// A discovered subject, immutable once written
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, serde::Serialize)]
#[diesel(table_name = topics)]
pub struct Topic {
    pub id: String,
    pub niche_id: String,
    pub name: String,
    pub description: Option<String>,
    pub source: String,
    pub size: i32,
    pub rank: i32,
    pub created_at: String,
}

impl Topic {
    pub fn is_trend(&self) -> bool {
        self.source == topic_sources::TREND
    }
}

#[derive(Insertable)]
#[diesel(table_name = draft_posts)]
pub struct NewDraftPost<'a> {
    pub id: &'a str,
    pub topic_id: &'a str,
    pub text: &'a str,
    pub category: Option<&'a str>,
}

/// One generated candidate message for a topic
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, serde::Serialize)]
#[diesel(table_name = draft_posts)]
pub struct DraftPost {
    pub id: String,
    pub topic_id: String,
    pub text: String,
    pub category: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = tone_edits)]
pub struct NewToneEdit<'a> {
    pub draft_post_id: &'a str,
    pub user_id: &'a str,
    pub text: &'a str,
    pub created_at: &'a str,
}

/// A draft rewritten in a user's voice. Append-only; the highest id wins.
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = tone_edits)]
pub struct ToneEdit {
    pub id: i32,
    pub draft_post_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = week_calendars)]
pub struct NewWeekCalendar<'a> {
    pub user_id: &'a str,
    pub iso_year: i32,
    pub week_number: i32,
    pub summary: &'a str,
    pub created_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = week_calendars)]
pub struct WeekCalendar {
    pub id: i32,
    pub user_id: String,
    pub iso_year: i32,
    pub week_number: i32,
    pub summary: String,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = draft_slots)]
pub struct NewDraftSlot<'a> {
    pub calendar_id: i32,
    pub weekday: i32,
    pub hour: i32,
    pub draft_post_id: &'a str,
    pub send_id: Option<i32>,
}

/// One cell of a week calendar
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = draft_slots)]
pub struct DraftSlot {
    pub id: i32,
    pub calendar_id: i32,
    pub weekday: i32,
    pub hour: i32,
    pub draft_post_id: String,
    pub send_id: Option<i32>,
}

#[derive(Insertable)]
#[diesel(table_name = committed_sends)]
pub struct NewCommittedSend<'a> {
    pub user_id: &'a str,
    pub draft_post_id: &'a str,
    pub calendar_id: Option<i32>,
    pub scheduled_for: Option<&'a str>,
    pub posted_at: Option<&'a str>,
    pub platform_post_id: Option<&'a str>,
    pub failures: i32,
    pub last_error: Option<&'a str>,
    pub created_at: &'a str,
}

/// The dispatch-relevant record for a post.
///
/// `scheduled_for` of `None` is a suggestion that the dispatcher never
/// picks up. `posted_at` is set once, when the post was published.
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = committed_sends)]
pub struct CommittedSend {
    pub id: i32,
    pub user_id: String,
    pub draft_post_id: String,
    pub calendar_id: Option<i32>,
    pub scheduled_for: Option<String>,
    pub posted_at: Option<String>,
    pub platform_post_id: Option<String>,
    pub failures: i32,
    pub last_error: Option<String>,
    pub created_at: String,
}

impl CommittedSend {
    pub fn is_posted(&self) -> bool {
        self.posted_at.is_some()
    }

    pub fn is_committed(&self) -> bool {
        self.scheduled_for.is_some()
    }
}

#[derive(Insertable)]
#[diesel(table_name = platform_credentials)]
pub struct NewCredentials<'a> {
    pub user_id: &'a str,
    pub access_token: &'a str,
    pub access_token_secret: &'a str,
    pub created_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = platform_credentials)]
pub struct StoredCredentials {
    pub id: i32,
    pub user_id: String,
    pub access_token: String,
    pub access_token_secret: String,
    pub created_at: String,
}

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Database connection wrapper with connection pool
pub struct Database {
    pool: DbPool,
}

/// Error type for database operations
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] diesel::r2d2::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Fetch the rowid of the last insert on this connection
pub(crate) fn last_insert_id(conn: &mut SqliteConnection) -> QueryResult<i32> {
    diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
        .first(conn)
}

impl Database {
    /// Get the database path that will be used
    pub fn db_path() -> std::path::PathBuf {
        get_db_path()
    }

    /// Create a new database at a custom path
    pub fn new(path: &str) -> Result<Self> {
        Self::open_at(path)
    }

    /// Open database at default path (respects PICKR_DB_PATH env var)
    pub fn open() -> Result<Self> {
        let path = get_db_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::Connection(e.to_string()))?;
            }
        }
        Self::open_at(&path)
    }

    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Open a private in-memory database on a single pooled connection
    pub fn open_in_memory() -> Result<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    pub(crate) fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| DbError::Connection(e.to_string()))
    }

    /// Run `f` as one unit of work: committed when it returns `Ok`,
    /// rolled back on any error.
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut SqliteConnection) -> std::result::Result<T, E>,
        E: From<diesel::result::Error> + From<DbError>,
    {
        let mut pooled = self.get_conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        conn.transaction(f)
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS schema_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                version TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                features TEXT NOT NULL,
                introduced_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY NOT NULL,
                username TEXT NOT NULL,
                tone_sample TEXT,
                created_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS niches (
                id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL UNIQUE,
                is_active BOOLEAN NOT NULL DEFAULT 1
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS user_niches (
                user_id TEXT NOT NULL,
                niche_id TEXT NOT NULL,
                PRIMARY KEY (user_id, niche_id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (niche_id) REFERENCES niches(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS topics (
                id TEXT PRIMARY KEY NOT NULL,
                niche_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                source TEXT NOT NULL,
                size INTEGER NOT NULL DEFAULT 0,
                rank INTEGER NOT NULL DEFAULT 5,
                created_at TEXT NOT NULL,
                FOREIGN KEY (niche_id) REFERENCES niches(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS draft_posts (
                id TEXT PRIMARY KEY NOT NULL,
                topic_id TEXT NOT NULL,
                text TEXT NOT NULL,
                category TEXT,
                FOREIGN KEY (topic_id) REFERENCES topics(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS tone_edits (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                draft_post_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (draft_post_id) REFERENCES draft_posts(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS week_calendars (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                user_id TEXT NOT NULL,
                iso_year INTEGER NOT NULL,
                week_number INTEGER NOT NULL,
                summary TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS draft_slots (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                calendar_id INTEGER NOT NULL,
                weekday INTEGER NOT NULL,
                hour INTEGER NOT NULL,
                draft_post_id TEXT NOT NULL,
                send_id INTEGER,
                FOREIGN KEY (calendar_id) REFERENCES week_calendars(id),
                FOREIGN KEY (draft_post_id) REFERENCES draft_posts(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS committed_sends (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                user_id TEXT NOT NULL,
                draft_post_id TEXT NOT NULL,
                calendar_id INTEGER,
                scheduled_for TEXT,
                posted_at TEXT,
                platform_post_id TEXT,
                failures INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (draft_post_id) REFERENCES draft_posts(id),
                FOREIGN KEY (calendar_id) REFERENCES week_calendars(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS platform_credentials (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                user_id TEXT NOT NULL,
                access_token TEXT NOT NULL,
                access_token_secret TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_topics_niche_created ON topics(niche_id, created_at)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_drafts_topic ON draft_posts(topic_id)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_tone_edits_pair ON tone_edits(draft_post_id, user_id)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_calendars_user_week ON week_calendars(user_id, iso_year, week_number)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_slots_calendar ON draft_slots(calendar_id)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_sends_due ON committed_sends(posted_at, scheduled_for)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_credentials_user ON platform_credentials(user_id)").execute(&mut conn)?;

        drop(conn);
        self.register_schema(&CURRENT_SCHEMA)?;
        Ok(())
    }

    fn register_schema(&self, schema: &StoreSchema) -> Result<()> {
        let mut conn = self.get_conn()?;
        let now = format_ts(Utc::now());
        let features_json = serde_json::to_string(&schema.features)
            .map_err(|e| DbError::Validation(e.to_string()))?;

        let new_schema = NewSchemaVersion {
            version: &schema.version_string(),
            name: schema.name,
            features: &features_json,
            introduced_at: &now,
        };

        diesel::insert_or_ignore_into(schema_versions::table)
            .values(&new_schema)
            .execute(&mut conn)?;

        Ok(())
    }

    // ========================================================================
    // Upstream Records
    // ========================================================================

    /// Insert a user; an existing id is left untouched
    pub fn add_user(&self, id: &str, username: &str, tone_sample: Option<&str>) -> Result<()> {
        let mut conn = self.get_conn()?;
        let now = format_ts(Utc::now());
        diesel::insert_or_ignore_into(users::table)
            .values(&NewUser { id, username, tone_sample, created_at: &now })
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let mut conn = self.get_conn()?;
        let user = users::table
            .filter(users::id.eq(user_id))
            .first::<User>(&mut conn)
            .optional()?;
        Ok(user)
    }

    /// Look a user up by id, falling back to username
    pub fn find_user(&self, id_or_name: &str) -> Result<User> {
        let mut conn = self.get_conn()?;
        users::table
            .filter(users::id.eq(id_or_name).or(users::username.eq(id_or_name)))
            .order(users::created_at.asc())
            .first::<User>(&mut conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound { kind: "user", id: id_or_name.to_string() })
    }

    pub fn get_all_users(&self) -> Result<Vec<User>> {
        let mut conn = self.get_conn()?;
        let all = users::table
            .order(users::created_at.asc())
            .load::<User>(&mut conn)?;
        Ok(all)
    }

    /// Active niches a user picked, ordered by title
    pub fn niches_for_user(&self, user_id: &str) -> Result<Vec<Niche>> {
        let mut conn = self.get_conn()?;
        let picked = niches::table
            .inner_join(user_niches::table.on(user_niches::niche_id.eq(niches::id)))
            .filter(user_niches::user_id.eq(user_id))
            .filter(niches::is_active.eq(true))
            .order(niches::title.asc())
            .select(Niche::as_select())
            .load::<Niche>(&mut conn)?;
        Ok(picked)
    }

    pub fn get_draft(&self, draft_id: &str) -> Result<DraftPost> {
        let mut conn = self.get_conn()?;
        draft_posts::table
            .filter(draft_posts::id.eq(draft_id))
            .first::<DraftPost>(&mut conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound { kind: "draft post", id: draft_id.to_string() })
    }

    /// Store a fresh set of platform credentials for a user
    pub fn add_credentials(&self, user_id: &str, access_token: &str, access_token_secret: &str) -> Result<i32> {
        let mut conn = self.get_conn()?;
        let now = format_ts(Utc::now());
        diesel::insert_into(platform_credentials::table)
            .values(&NewCredentials { user_id, access_token, access_token_secret, created_at: &now })
            .execute(&mut conn)?;
        Ok(last_insert_id(&mut conn)?)
    }

    /// Most recently stored credentials row for a user
    pub fn latest_credentials(&self, user_id: &str) -> Result<Option<StoredCredentials>> {
        let mut conn = self.get_conn()?;
        let creds = platform_credentials::table
            .filter(platform_credentials::user_id.eq(user_id))
            .order(platform_credentials::id.desc())
            .first::<StoredCredentials>(&mut conn)
            .optional()?;
        Ok(creds)
    }

    // ========================================================================
    // Sends
    // ========================================================================

    pub fn get_send(&self, send_id: i32) -> Result<Option<CommittedSend>> {
        let mut conn = self.get_conn()?;
        let send = committed_sends::table
            .filter(committed_sends::id.eq(send_id))
            .first::<CommittedSend>(&mut conn)
            .optional()?;
        Ok(send)
    }

    /// Committed sends not yet posted, soonest first
    pub fn get_pending_sends(&self) -> Result<Vec<CommittedSend>> {
        let mut conn = self.get_conn()?;
        let sends = committed_sends::table
            .filter(committed_sends::posted_at.is_null())
            .filter(committed_sends::scheduled_for.is_not_null())
            .order((committed_sends::scheduled_for.asc(), committed_sends::id.asc()))
            .load::<CommittedSend>(&mut conn)?;
        Ok(sends)
    }

    /// Get summary counts
    pub fn get_summary(&self) -> Result<DbSummary> {
        let mut conn = self.get_conn()?;
        let count = |n: i64| i32::try_from(n).unwrap_or(i32::MAX);

        let total_users: i64 = users::table.count().get_result(&mut conn)?;
        let total_topics: i64 = topics::table.count().get_result(&mut conn)?;
        let total_drafts: i64 = draft_posts::table.count().get_result(&mut conn)?;
        let total_calendars: i64 = week_calendars::table.count().get_result(&mut conn)?;
        let pending: i64 = committed_sends::table
            .filter(committed_sends::posted_at.is_null())
            .filter(committed_sends::scheduled_for.is_not_null())
            .count()
            .get_result(&mut conn)?;
        let posted: i64 = committed_sends::table
            .filter(committed_sends::posted_at.is_not_null())
            .count()
            .get_result(&mut conn)?;

        Ok(DbSummary {
            total_users: count(total_users),
            total_topics: count(total_topics),
            total_drafts: count(total_drafts),
            total_calendars: count(total_calendars),
            pending_sends: count(pending),
            posted_sends: count(posted),
        })
    }
}

// ============================================================================
// Additional Types
// ============================================================================

/// Summary statistics from the database
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbSummary {
    pub total_users: i32,
    pub total_topics: i32,
    pub total_drafts: i32,
    pub total_calendars: i32,
    pub pending_sends: i32,
    pub posted_sends: i32,
}
