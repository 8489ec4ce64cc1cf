//! Tone matching gate
//!
//! Decides whether a draft needs a rewrite in the user's voice before it is
//! shown or sent, and resolves the text that should actually go out.

use crate::db::{format_ts, Database, DbError, DraftPost, NewToneEdit, ToneEdit, User};
use crate::external::{run_command, CommandOutcome, EXIT_RATE_LIMITED};
use crate::retry::{RateLimited, RetryPolicy};
use crate::schema::{draft_posts, tone_edits};
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::io::Write;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure from the rewrite collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RewriteError {
    #[error("rewrite rate limited")]
    RateLimited,

    #[error("rewrite failed: {0}")]
    Failed(String),
}

impl RateLimited for RewriteError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, RewriteError::RateLimited)
    }
}

/// Rewrites text so it reads like the style sample
pub trait Rewriter {
    fn rewrite(&self, text: &str, style_sample: &str) -> Result<String, RewriteError>;
}

/// Wraps a rewriter with a retry policy for rate limits
pub struct RetryingRewriter<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: Rewriter> RetryingRewriter<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<R: Rewriter> Rewriter for RetryingRewriter<R> {
    fn rewrite(&self, text: &str, style_sample: &str) -> Result<String, RewriteError> {
        self.policy.run(|| self.inner.rewrite(text, style_sample))
    }
}

/// Samples longer than this only reach the command through
/// `PICKR_STYLE_SAMPLE_FILE`
pub const MAX_SAMPLE_ENV_BYTES: usize = 32 * 1024;

/// Rewriter backed by an external command.
///
/// The draft text arrives on stdin. The style sample is written to a
/// temporary file named by `PICKR_STYLE_SAMPLE_FILE`, and short samples are
/// also passed inline in `PICKR_STYLE_SAMPLE`. The rewrite is read from
/// stdout.
pub struct CommandRewriter {
    command: String,
}

impl CommandRewriter {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl Rewriter for CommandRewriter {
    fn rewrite(&self, text: &str, style_sample: &str) -> Result<String, RewriteError> {
        let mut sample_file = tempfile::NamedTempFile::new()
            .map_err(|e| RewriteError::Failed(format!("could not stage style sample: {}", e)))?;
        sample_file
            .write_all(style_sample.as_bytes())
            .and_then(|_| sample_file.flush())
            .map_err(|e| RewriteError::Failed(format!("could not stage style sample: {}", e)))?;
        let sample_path = sample_file.path().to_string_lossy().into_owned();

        let mut env = vec![("PICKR_STYLE_SAMPLE_FILE", sample_path.as_str())];
        if style_sample.len() <= MAX_SAMPLE_ENV_BYTES {
            env.push(("PICKR_STYLE_SAMPLE", style_sample));
        }
        let outcome = run_command(&self.command, text, &env)
            .map_err(|e| RewriteError::Failed(format!("could not run rewrite command: {}", e)))?;
        match outcome {
            CommandOutcome::Success(out) if out.is_empty() => {
                Err(RewriteError::Failed("rewrite command produced no text".to_string()))
            }
            CommandOutcome::Success(out) => Ok(out),
            CommandOutcome::Failed { code: Some(EXIT_RATE_LIMITED), .. } => Err(RewriteError::RateLimited),
            CommandOutcome::Failed { code, stderr } => Err(RewriteError::Failed(format!(
                "exit {}: {}",
                code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
                stderr
            ))),
        }
    }
}

/// What the gate did for one draft
#[derive(Debug, Clone, PartialEq)]
pub enum ToneOutcome {
    /// The user has no usable writing sample
    NotEligible,
    /// An edit already exists for this draft and user
    AlreadyEdited,
    /// A new edit was stored
    Rewritten { edit_id: i32 },
    /// The rewrite failed; the original text stays effective
    RewriteFailed(String),
}

pub struct ToneGate<'a> {
    rewriter: &'a dyn Rewriter,
    min_sample_chars: usize,
}

impl<'a> ToneGate<'a> {
    pub fn new(rewriter: &'a dyn Rewriter, min_sample_chars: usize) -> Self {
        Self { rewriter, min_sample_chars }
    }

    /// The user's writing sample, if it is long enough to imitate
    pub fn usable_sample<'u>(&self, user: &'u User) -> Option<&'u str> {
        user.tone_sample
            .as_deref()
            .map(str::trim)
            .filter(|s| s.chars().count() >= self.min_sample_chars)
    }

    /// Make sure a tone edit exists for `draft` and `user` when one is due.
    ///
    /// Rewrite failures are reported, not raised: the draft can still go
    /// out with its original text.
    pub fn ensure(&self, db: &Database, user: &User, draft: &DraftPost) -> Result<ToneOutcome, DbError> {
        let Some(sample) = self.usable_sample(user) else {
            return Ok(ToneOutcome::NotEligible);
        };

        let mut conn = db.get_conn()?;
        if latest_tone_edit(&mut conn, &draft.id, &user.id)?.is_some() {
            return Ok(ToneOutcome::AlreadyEdited);
        }
        // Release the connection while the collaborator runs
        drop(conn);

        let rewritten = match self.rewriter.rewrite(&draft.text, sample) {
            Ok(text) => text,
            Err(e) => {
                warn!(user_id = %user.id, draft_id = %draft.id, error = %e, "tone rewrite failed");
                return Ok(ToneOutcome::RewriteFailed(e.to_string()));
            }
        };

        let mut conn = db.get_conn()?;
        let edit_id = add_tone_edit(&mut conn, &draft.id, &user.id, &rewritten)?;
        debug!(user_id = %user.id, draft_id = %draft.id, edit_id, "stored tone edit");
        Ok(ToneOutcome::Rewritten { edit_id })
    }
}

/// The user's most recent edit of a draft, if any
pub fn latest_tone_edit(conn: &mut SqliteConnection, draft_id: &str, user_id: &str) -> QueryResult<Option<ToneEdit>> {
    tone_edits::table
        .filter(tone_edits::draft_post_id.eq(draft_id))
        .filter(tone_edits::user_id.eq(user_id))
        .order(tone_edits::id.desc())
        .first::<ToneEdit>(conn)
        .optional()
}

/// Append a tone edit; earlier edits are never touched
pub fn add_tone_edit(conn: &mut SqliteConnection, draft_id: &str, user_id: &str, text: &str) -> QueryResult<i32> {
    let now = format_ts(Utc::now());
    diesel::insert_into(tone_edits::table)
        .values(&NewToneEdit {
            draft_post_id: draft_id,
            user_id,
            text,
            created_at: &now,
        })
        .execute(conn)?;
    crate::db::last_insert_id(conn)
}

/// Text that goes out for `draft_id` on behalf of `user_id`: the latest
/// tone edit when one exists, otherwise the draft's own text.
pub fn effective_text(conn: &mut SqliteConnection, draft_id: &str, user_id: &str) -> Result<String, DbError> {
    if let Some(edit) = latest_tone_edit(conn, draft_id, user_id)? {
        return Ok(edit.text);
    }
    draft_posts::table
        .filter(draft_posts::id.eq(draft_id))
        .select(draft_posts::text)
        .first::<String>(conn)
        .optional()?
        .ok_or_else(|| DbError::NotFound { kind: "draft post", id: draft_id.to_string() })
}

impl Database {
    pub fn effective_text(&self, draft_id: &str, user_id: &str) -> Result<String, DbError> {
        let mut conn = self.get_conn()?;
        effective_text(&mut conn, draft_id, user_id)
    }

    pub fn add_tone_edit(&self, draft_id: &str, user_id: &str, text: &str) -> Result<i32, DbError> {
        let mut conn = self.get_conn()?;
        Ok(add_tone_edit(&mut conn, draft_id, user_id, text)?)
    }
}
