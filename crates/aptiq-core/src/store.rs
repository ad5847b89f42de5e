//! The question bank as held in a storage backend.
//!
//! Reads never fail: a backend error is logged and the read returns an
//! empty result, so a broken database degrades to an empty quiz instead of
//! an error screen. Seeding reports its error so callers can log it; it is
//! retried on the next call because it only ever writes into an empty
//! collection.

use std::sync::Arc;

use crate::error::{QuizError, StoreError};
use crate::model::{Category, Difficulty, Question};
use crate::sampler::QuestionSampler;
use crate::statistics::{compute_question_stats, QuestionStats};
use crate::storage::{Collection, Document, IndexEntry, Query, StorageBackend, StoredDocument};

/// Secondary index entries for a question: type, category, difficulty, and
/// one entry per tag.
pub fn question_index(question: &Question) -> Vec<IndexEntry> {
    let mut index = vec![
        IndexEntry::new("type", question.kind.as_str()),
        IndexEntry::new("category", question.category.as_str()),
        IndexEntry::new("difficulty", question.difficulty.as_str()),
    ];
    index.extend(question.tags.iter().map(|t| IndexEntry::new("tags", t.as_str())));
    index
}

/// Filtered, randomized, and paged access to the question bank.
pub struct QuestionStore {
    backend: Arc<dyn StorageBackend>,
    sampler: Arc<QuestionSampler>,
}

impl QuestionStore {
    pub fn new(backend: Arc<dyn StorageBackend>, sampler: Arc<QuestionSampler>) -> Self {
        Self { backend, sampler }
    }

    /// Insert `corpus` if the store holds no questions. Returns how many
    /// questions were inserted (0 when already seeded).
    pub async fn seed_if_empty(&self, corpus: &[Question]) -> Result<usize, QuizError> {
        let existing = self
            .backend
            .count(Collection::Questions)
            .await
            .map_err(QuizError::seeding)?;
        if existing > 0 {
            tracing::debug!("question bank already holds {existing} questions, not seeding");
            return Ok(0);
        }

        let documents = corpus
            .iter()
            .map(|q| Document::from_value(q.id.as_str(), q, question_index(q)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(QuizError::seeding)?;

        let inserted = self
            .backend
            .put_many(Collection::Questions, documents)
            .await
            .map_err(QuizError::seeding)?;
        tracing::info!(backend = self.backend.name(), "seeded {inserted} questions");
        Ok(inserted)
    }

    /// Every question, in insertion order.
    pub async fn all(&self) -> Vec<Question> {
        self.read("all", &Query::all()).await
    }

    pub async fn get(&self, id: &str) -> Option<Question> {
        match self.backend.get(Collection::Questions, id).await {
            Ok(doc) => doc.and_then(|d| decode(&d)),
            Err(e) => {
                log_degraded("get", &e);
                None
            }
        }
    }

    /// A stable page of questions in insertion order.
    pub async fn page(&self, offset: usize, limit: usize) -> Vec<Question> {
        self.read("page", &Query::all().offset(offset).limit(limit))
            .await
    }

    /// Up to `limit` questions of `category` (and `difficulty`, if given)
    /// in random order.
    pub async fn by_category(
        &self,
        category: Category,
        difficulty: Option<Difficulty>,
        limit: usize,
    ) -> Vec<Question> {
        let mut query = Query::all().filter("category", category.as_str());
        if let Some(difficulty) = difficulty {
            query = query.filter("difficulty", difficulty.as_str());
        }
        let matching = self.read("by_category", &query).await;
        self.sampler.random_subset(matching, limit)
    }

    /// Up to `limit` questions of `difficulty` in random order.
    pub async fn by_difficulty(&self, difficulty: Difficulty, limit: usize) -> Vec<Question> {
        let query = Query::all().filter("difficulty", difficulty.as_str());
        let matching = self.read("by_difficulty", &query).await;
        self.sampler.random_subset(matching, limit)
    }

    /// Up to `limit` questions carrying `tag`, in insertion order.
    pub async fn by_tag(&self, tag: &str, limit: usize) -> Vec<Question> {
        self.read("by_tag", &Query::all().filter("tags", tag).limit(limit))
            .await
    }

    pub async fn stats(&self) -> QuestionStats {
        compute_question_stats(&self.all().await)
    }

    async fn read(&self, op: &str, query: &Query) -> Vec<Question> {
        match self.backend.query(Collection::Questions, query).await {
            Ok(docs) => docs.iter().filter_map(decode).collect(),
            Err(e) => {
                log_degraded(op, &e);
                Vec::new()
            }
        }
    }
}

fn decode(doc: &StoredDocument) -> Option<Question> {
    let question = match doc.decode::<Question>() {
        Ok(q) => q,
        Err(e) => {
            tracing::warn!("skipping unreadable question '{}': {e}", doc.key);
            return None;
        }
    };
    match question.check_invariants() {
        Ok(()) => Some(question),
        Err(reason) => {
            tracing::warn!("skipping invalid question '{}': {reason}", doc.key);
            None
        }
    }
}

fn log_degraded(op: &str, err: &StoreError) {
    if err.is_unavailable() {
        tracing::warn!("question store unavailable during {op}, returning no questions: {err}");
    } else {
        tracing::warn!("question store {op} failed, returning no questions: {err}");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::memory::MemoryBackend;
    use crate::model::fixtures::corpus;

    fn store(backend: Arc<MemoryBackend>) -> QuestionStore {
        QuestionStore::new(backend, Arc::new(QuestionSampler::seeded(11)))
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(backend.clone());

        assert_eq!(store.seed_if_empty(&corpus(3, 3, 3)).await.unwrap(), 9);
        assert_eq!(store.seed_if_empty(&corpus(3, 3, 3)).await.unwrap(), 0);
        assert_eq!(store.all().await.len(), 9);
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn corrupt_rows_are_skipped() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(backend.clone());
        store.seed_if_empty(&corpus(2, 0, 0)).await.unwrap();

        let mut broken = corpus(0, 1, 0).remove(0);
        broken.id = "broken".into();
        broken.correct_answer_index = 9;
        backend
            .put(
                Collection::Questions,
                Document::from_value("broken", &broken, question_index(&broken)).unwrap(),
            )
            .await
            .unwrap();
        backend
            .put(
                Collection::Questions,
                Document {
                    key: "garbled".into(),
                    body: serde_json::json!({ "id": "garbled" }),
                    index: Vec::new(),
                },
            )
            .await
            .unwrap();

        assert_eq!(store.all().await.len(), 2);
        assert!(store.get("broken").await.is_none());
        assert!(store.by_difficulty(Difficulty::Medium, 5).await.is_empty());
    }

    #[tokio::test]
    async fn seed_failure_is_classified_and_retried() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(backend.clone());

        backend.set_unavailable(true);
        let err = store.seed_if_empty(&corpus(1, 1, 1)).await.unwrap_err();
        assert!(matches!(err, QuizError::StoreUnavailable(_)));

        backend.set_unavailable(false);
        backend.set_fail_writes(true);
        let err = store.seed_if_empty(&corpus(1, 1, 1)).await.unwrap_err();
        assert!(matches!(err, QuizError::SeedFailure(_)));
        assert!(store.all().await.is_empty());

        backend.set_fail_writes(false);
        assert_eq!(store.seed_if_empty(&corpus(1, 1, 1)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unavailable_store_reads_empty() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(backend.clone());
        store.seed_if_empty(&corpus(2, 2, 2)).await.unwrap();

        backend.set_unavailable(true);
        assert!(store.all().await.is_empty());
        assert!(store.get("easy-0").await.is_none());
        assert!(store.by_difficulty(Difficulty::Easy, 5).await.is_empty());
        assert_eq!(store.stats().await.total, 0);
    }

    #[tokio::test]
    async fn filtered_reads_respect_filters_and_limit() {
        let store = store(Arc::new(MemoryBackend::new()));
        store.seed_if_empty(&corpus(10, 10, 10)).await.unwrap();

        let hard = store.by_difficulty(Difficulty::Hard, 4).await;
        assert_eq!(hard.len(), 4);
        assert!(hard.iter().all(|q| q.difficulty == Difficulty::Hard));

        let english = store.by_category(Category::English, None, 100).await;
        assert!(!english.is_empty());
        assert!(english.iter().all(|q| q.category == Category::English));

        let narrow = store
            .by_category(Category::English, Some(Difficulty::Easy), 100)
            .await;
        assert!(narrow
            .iter()
            .all(|q| q.category == Category::English && q.difficulty == Difficulty::Easy));
        assert!(narrow.len() < english.len());
    }

    #[tokio::test]
    async fn short_bucket_returns_what_exists() {
        let store = store(Arc::new(MemoryBackend::new()));
        store.seed_if_empty(&corpus(2, 0, 0)).await.unwrap();
        let out = store.by_difficulty(Difficulty::Easy, 10).await;
        assert_eq!(out.len(), 2);
        assert!(store.by_difficulty(Difficulty::Hard, 10).await.is_empty());
    }

    #[tokio::test]
    async fn get_page_and_tags() {
        let mut questions = corpus(3, 3, 0);
        questions[4].tags.insert("series".into());
        let store = store(Arc::new(MemoryBackend::new()));
        store.seed_if_empty(&questions).await.unwrap();

        assert_eq!(store.get("medium-1").await.unwrap().id, "medium-1");
        assert!(store.get("missing").await.is_none());

        let first = store.page(0, 4).await;
        let rest = store.page(4, 4).await;
        assert_eq!(first.len(), 4);
        assert_eq!(rest.len(), 2);
        let ids: HashSet<_> = first.iter().chain(&rest).map(|q| q.id.clone()).collect();
        assert_eq!(ids.len(), 6);
        assert_eq!(first[0].id, questions[0].id);

        let tagged = store.by_tag("series", 10).await;
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, questions[4].id);
    }

    #[tokio::test]
    async fn stats_totals_agree() {
        let store = store(Arc::new(MemoryBackend::new()));
        store.seed_if_empty(&corpus(4, 3, 2)).await.unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.total, 9);
        assert_eq!(stats.by_category.values().sum::<usize>(), 9);
        assert_eq!(stats.by_difficulty["hard"], 2);
    }

    #[test]
    fn index_has_one_entry_per_tag() {
        let mut q = corpus(1, 0, 0).remove(0);
        q.tags.insert("a".into());
        q.tags.insert("b".into());
        let index = question_index(&q);
        assert_eq!(index.iter().filter(|e| e.field == "tags").count(), 2);
        assert!(index.contains(&IndexEntry::new("difficulty", "easy")));
    }
}
