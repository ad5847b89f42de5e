//! Durable record of completed quiz sessions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::QuizError;
use crate::model::SessionRecord;
use crate::statistics::{compute_user_summary, UserSummary};
use crate::storage::{Collection, Document, IndexEntry, Query, StorageBackend};

/// A session as read back from the archive, with its archive key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedSession {
    pub seq: u64,
    pub session: SessionRecord,
}

/// Append-only store of completed sessions, queried per user.
pub struct SessionArchive {
    backend: Arc<dyn StorageBackend>,
}

impl SessionArchive {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Append a completed session and return its archive key.
    ///
    /// Sessions that did not complete are refused, so a partial run can
    /// never show up in history.
    pub async fn save(&self, session: &SessionRecord) -> Result<u64, QuizError> {
        if !session.completed {
            return Err(QuizError::IncompleteSession(session.id));
        }

        let index = vec![
            IndexEntry::new("user_id", session.user_id.as_str()),
            IndexEntry::new("completed", "true"),
            IndexEntry::new("start_time", session.started_at.to_rfc3339()),
        ];
        let document = Document::from_value(session.id.to_string(), session, index)
            .map_err(QuizError::SessionSaveFailure)?;

        let seq = self
            .backend
            .append(Collection::QuizSessions, document)
            .await
            .map_err(QuizError::SessionSaveFailure)?;
        tracing::debug!(session = %session.id, seq, "session archived");
        Ok(seq)
    }

    /// The most recent `limit` completed sessions of `user_id`, newest
    /// first. Returns an empty list if the archive cannot be read.
    pub async fn history(&self, user_id: &str, limit: usize) -> Vec<ArchivedSession> {
        self.load(user_id, Some(limit)).await
    }

    /// Aggregate statistics over every archived session of `user_id`.
    pub async fn summary(&self, user_id: &str) -> UserSummary {
        let records: Vec<SessionRecord> = self
            .load(user_id, None)
            .await
            .into_iter()
            .map(|a| a.session)
            .collect();
        compute_user_summary(user_id, &records)
    }

    async fn load(&self, user_id: &str, limit: Option<usize>) -> Vec<ArchivedSession> {
        let mut query = Query::all()
            .filter("user_id", user_id)
            .filter("completed", "true")
            .newest_first();
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let docs = match self.backend.query(Collection::QuizSessions, &query).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!("reading history for '{user_id}' failed, returning none: {e}");
                return Vec::new();
            }
        };

        docs.into_iter()
            .filter_map(|doc| match doc.decode::<SessionRecord>() {
                Ok(session) => Some(ArchivedSession {
                    seq: doc.seq,
                    session,
                }),
                Err(e) => {
                    tracing::warn!("skipping unreadable session {}: {e}", doc.key);
                    None
                }
            })
            .collect()
    }
}
