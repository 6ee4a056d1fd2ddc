//! Persistence Layer (C10).
//!
//! A SQLite-backed store for repositories, patterns, and recommendations.
//! Grounded in `db/core.rs`'s `SqlitePoolOptions`/table-creation/param-bound
//! query style, narrowed to exactly the operations spec §4.10 requires.
//!
//! JSON-shaped fields (`categories`, `branches`, `tags`, `applicable_patterns`,
//! `code_examples`, `implementation_steps`, `metrics`, `metadata`) are stored
//! as opaque TEXT columns; encode/decode is a pure function at the row
//! boundary, and a row whose JSON fails to decode is treated as empty rather
//! than aborting the read (spec §9).

use crate::error::{PersistenceError, PersistenceResult};
use crate::types::{
    AnalysisStatus, CodeExample, ImplementationStep, Pattern, Priority, Recommendation,
    RecommendationMetrics, RecommendationStatus, RecommendationType, Repository,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, Row, SqlitePool};
use std::collections::HashSet;
use tracing::warn;

/// Open a pool and ensure the schema exists. Mirrors `db::init_db`'s
/// directory-creation-then-connect sequence, trimmed to the tables this
/// crate owns.
pub async fn connect(database_url: &str) -> PersistenceResult<SqlitePool> {
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        let file_path = std::path::Path::new(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        if !file_path.exists() && !path.is_empty() && path != ":memory:" {
            std::fs::File::create(file_path).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    create_tables(&pool).await?;
    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repositories (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            default_branch TEXT NOT NULL,
            primary_language TEXT,
            tech_stack_profile TEXT,
            categories TEXT NOT NULL DEFAULT '[]',
            branches TEXT NOT NULL DEFAULT '[]',
            patterns_count INTEGER NOT NULL DEFAULT 0,
            analysis_status TEXT NOT NULL DEFAULT 'pending',
            last_analyzed TEXT,
            metadata TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repository_patterns (
            id TEXT PRIMARY KEY,
            repository_id TEXT NOT NULL,
            pattern_type TEXT NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            file_path TEXT NOT NULL,
            line_start INTEGER NOT NULL,
            line_end INTEGER NOT NULL,
            language TEXT NOT NULL,
            confidence REAL NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            context_before TEXT NOT NULL DEFAULT '',
            context_after TEXT NOT NULL DEFAULT '',
            metadata TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_patterns_repo ON repository_patterns(repository_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repository_recommendations (
            id TEXT PRIMARY KEY,
            repository_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            recommendation_type TEXT NOT NULL,
            priority TEXT NOT NULL,
            applicable_patterns TEXT NOT NULL DEFAULT '[]',
            code_examples TEXT NOT NULL DEFAULT '[]',
            implementation_steps TEXT NOT NULL DEFAULT '[]',
            estimated_effort TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'active',
            metrics TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_recs_repo_title_status \
         ON repository_recommendations(repository_id, title, status)",
    )
    .execute(pool)
    .await?;

    // Optional improvement counters (spec §4.10: "improvements (optional
    // counters)") — a minimal append-only metric log, not otherwise read by
    // this crate's own operations.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS improvements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repository_id TEXT NOT NULL,
            metric_name TEXT NOT NULL,
            metric_value INTEGER NOT NULL,
            recorded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn encode<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Decode a JSON column; a malformed value is treated as the type's default
/// rather than failing the whole row read (spec §9).
fn decode<T: DeserializeOwned + Default>(raw: &str, field: &str) -> T {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("failed to decode JSON column '{field}': {e}, using default");
        T::default()
    })
}

#[derive(FromRow)]
struct RepositoryRow {
    id: String,
    full_name: String,
    default_branch: String,
    primary_language: Option<String>,
    tech_stack_profile: Option<String>,
    categories: String,
    branches: String,
    patterns_count: i64,
    analysis_status: String,
    last_analyzed: Option<String>,
    metadata: String,
}

impl RepositoryRow {
    fn into_domain(self) -> Repository {
        Repository {
            id: self.id,
            full_name: self.full_name,
            default_branch: self.default_branch,
            primary_language: self.primary_language,
            tech_stack_profile: self.tech_stack_profile,
            categories: decode(&self.categories, "categories"),
            branches: decode(&self.branches, "branches"),
            patterns_count: self.patterns_count,
            analysis_status: AnalysisStatus::parse(&self.analysis_status)
                .unwrap_or(AnalysisStatus::Pending),
            last_analyzed: self
                .last_analyzed
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            metadata: decode(&self.metadata, "metadata"),
        }
    }
}

#[derive(FromRow)]
struct RecommendationRow {
    id: String,
    repository_id: String,
    title: String,
    description: String,
    recommendation_type: String,
    priority: String,
    applicable_patterns: String,
    code_examples: String,
    implementation_steps: String,
    estimated_effort: String,
    tags: String,
    status: String,
    metrics: String,
    created_at: String,
    updated_at: String,
    metadata: String,
}

impl RecommendationRow {
    fn into_domain(self) -> Option<Recommendation> {
        Some(Recommendation {
            id: self.id,
            repository_id: self.repository_id,
            title: self.title,
            description: self.description,
            recommendation_type: parse_recommendation_type(&self.recommendation_type)?,
            priority: parse_priority(&self.priority)?,
            applicable_patterns: decode(&self.applicable_patterns, "applicable_patterns"),
            code_examples: decode::<Vec<CodeExample>>(&self.code_examples, "code_examples"),
            implementation_steps: decode::<Vec<ImplementationStep>>(
                &self.implementation_steps,
                "implementation_steps",
            ),
            estimated_effort: self.estimated_effort,
            tags: decode(&self.tags, "tags"),
            status: RecommendationStatus::parse(&self.status)?,
            metrics: decode::<RecommendationMetrics>(&self.metrics, "metrics"),
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .ok()?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&self.updated_at)
                .ok()?
                .with_timezone(&Utc),
            metadata: decode(&self.metadata, "metadata"),
        })
    }
}

fn parse_recommendation_type(s: &str) -> Option<RecommendationType> {
    Some(match s {
        "security" => RecommendationType::Security,
        "architecture" => RecommendationType::Architecture,
        "performance" => RecommendationType::Performance,
        "best_practices" => RecommendationType::BestPractices,
        "pattern_usage" => RecommendationType::PatternUsage,
        "migration" => RecommendationType::Migration,
        "type_safety" => RecommendationType::TypeSafety,
        _ => return None,
    })
}

fn recommendation_type_str(t: RecommendationType) -> &'static str {
    match t {
        RecommendationType::Security => "security",
        RecommendationType::Architecture => "architecture",
        RecommendationType::Performance => "performance",
        RecommendationType::BestPractices => "best_practices",
        RecommendationType::PatternUsage => "pattern_usage",
        RecommendationType::Migration => "migration",
        RecommendationType::TypeSafety => "type_safety",
    }
}

fn parse_priority(s: &str) -> Option<Priority> {
    Some(match s {
        "critical" => Priority::Critical,
        "high" => Priority::High,
        "medium" => Priority::Medium,
        "low" => Priority::Low,
        _ => return None,
    })
}

fn priority_str(p: Priority) -> &'static str {
    match p {
        Priority::Critical => "critical",
        Priority::High => "high",
        Priority::Medium => "medium",
        Priority::Low => "low",
    }
}

/// Handle onto the persistence layer. Cheap to clone (wraps a pooled
/// connection handle, same as `sqlx::SqlitePool`).
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> PersistenceResult<Self> {
        Ok(Self::new(connect(database_url).await?))
    }

    /// `upsert_repository(info)` (spec §4.10): insert or replace by `id`.
    pub async fn upsert_repository(&self, repo: &Repository) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO repositories
                (id, full_name, default_branch, primary_language, tech_stack_profile,
                 categories, branches, patterns_count, analysis_status, last_analyzed, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&repo.id)
        .bind(&repo.full_name)
        .bind(&repo.default_branch)
        .bind(&repo.primary_language)
        .bind(&repo.tech_stack_profile)
        .bind(encode(&repo.categories))
        .bind(encode(&repo.branches))
        .bind(repo.patterns_count)
        .bind(repo.analysis_status.as_str())
        .bind(repo.last_analyzed.map(|dt| dt.to_rfc3339()))
        .bind(encode(&repo.metadata))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_repository(&self, id: &str) -> PersistenceResult<Option<Repository>> {
        let row = sqlx::query_as::<_, RepositoryRow>("SELECT * FROM repositories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(RepositoryRow::into_domain))
    }

    /// Repositories eligible for the scheduler's due-list computation
    /// (spec §4.11 step 1), ordered by `last_analyzed` ascending.
    pub async fn list_analyzed_repositories(&self) -> PersistenceResult<Vec<Repository>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories WHERE analysis_status = 'analyzed' \
             ORDER BY last_analyzed ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RepositoryRow::into_domain).collect())
    }

    /// `replace_patterns(repository_id, patterns[])` (spec §4.10):
    /// transactional delete-then-insert so the stored set equals `patterns`
    /// exactly on the logical dedup key.
    pub async fn replace_patterns(
        &self,
        repository_id: &str,
        patterns: &[Pattern],
    ) -> PersistenceResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM repository_patterns WHERE repository_id = ?")
            .bind(repository_id)
            .execute(&mut *tx)
            .await?;

        for pattern in patterns {
            sqlx::query(
                r#"
                INSERT INTO repository_patterns
                    (id, repository_id, pattern_type, category, subcategory, content,
                     content_hash, file_path, line_start, line_end, language, confidence,
                     tags, context_before, context_after, metadata)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&pattern.id)
            .bind(repository_id)
            .bind(&pattern.pattern_type)
            .bind(&pattern.category)
            .bind(&pattern.subcategory)
            .bind(&pattern.content)
            .bind(&pattern.content_hash)
            .bind(&pattern.file_path)
            .bind(pattern.line_start)
            .bind(pattern.line_end)
            .bind(&pattern.language)
            .bind(pattern.confidence)
            .bind(encode(&pattern.tags))
            .bind(&pattern.context_before)
            .bind(&pattern.context_after)
            .bind(encode(&pattern.metadata))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// `insert_recommendations_unique(recommendations[])` (spec §4.10):
    /// skips a candidate if an active row with the same `(repository_id,
    /// title)` already exists, and skips intra-batch duplicates. Returns
    /// the number actually inserted.
    pub async fn insert_recommendations_unique(
        &self,
        recommendations: &[Recommendation],
    ) -> PersistenceResult<usize> {
        let mut tx = self.pool.begin().await?;
        let mut seen_in_batch: HashSet<(String, String)> = HashSet::new();
        let mut inserted = 0usize;

        for rec in recommendations {
            let key = (rec.repository_id.clone(), rec.title.clone());
            if seen_in_batch.contains(&key) {
                continue;
            }

            let exists: Option<i64> = sqlx::query_scalar(
                "SELECT 1 FROM repository_recommendations \
                 WHERE repository_id = ? AND title = ? AND status = 'active' LIMIT 1",
            )
            .bind(&rec.repository_id)
            .bind(&rec.title)
            .fetch_optional(&mut *tx)
            .await?;

            if exists.is_some() {
                seen_in_batch.insert(key);
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO repository_recommendations
                    (id, repository_id, title, description, recommendation_type, priority,
                     applicable_patterns, code_examples, implementation_steps, estimated_effort,
                     tags, status, metrics, created_at, updated_at, metadata)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&rec.id)
            .bind(&rec.repository_id)
            .bind(&rec.title)
            .bind(&rec.description)
            .bind(recommendation_type_str(rec.recommendation_type))
            .bind(priority_str(rec.priority))
            .bind(encode(&rec.applicable_patterns))
            .bind(encode(&rec.code_examples))
            .bind(encode(&rec.implementation_steps))
            .bind(&rec.estimated_effort)
            .bind(encode(&rec.tags))
            .bind(rec.status.as_str())
            .bind(encode(&rec.metrics))
            .bind(rec.created_at.to_rfc3339())
            .bind(rec.updated_at.to_rfc3339())
            .bind(encode(&rec.metadata))
            .execute(&mut *tx)
            .await?;

            seen_in_batch.insert(key);
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// `age_stale_recommendations(cutoff)` (spec §4.10): outdate every
    /// `active` row created before `cutoff`.
    pub async fn age_stale_recommendations(&self, cutoff: DateTime<Utc>) -> PersistenceResult<u64> {
        let result = sqlx::query(
            "UPDATE repository_recommendations SET status = 'outdated', updated_at = ? \
             WHERE status = 'active' AND created_at < ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(cutoff.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// `cleanup_duplicate_recommendations()` (spec §4.10): for each
    /// `(repository_id, title)` with more than one `active` row, keep the
    /// most recently created and delete the rest. Tie-break on identical
    /// `created_at` is the lowest `id` (spec §9 open question, resolved
    /// here as an explicit choice since the source leaves it unspecified).
    pub async fn cleanup_duplicate_recommendations(&self) -> PersistenceResult<u64> {
        let rows = sqlx::query(
            "SELECT id, repository_id, title, created_at FROM repository_recommendations \
             WHERE status = 'active' \
             ORDER BY repository_id, title, created_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut last_key: Option<(String, String)> = None;
        let mut to_delete: Vec<String> = Vec::new();

        for row in rows {
            let id: String = row.try_get("id")?;
            let repository_id: String = row.try_get("repository_id")?;
            let title: String = row.try_get("title")?;
            let key = (repository_id, title);

            if last_key.as_ref() == Some(&key) {
                to_delete.push(id);
            } else {
                last_key = Some(key);
            }
        }

        if to_delete.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for id in &to_delete {
            sqlx::query("DELETE FROM repository_recommendations WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(to_delete.len() as u64)
    }

    /// `clear_repository_recommendations(repository_id)` (spec §4.10): used
    /// at the start of a fresh scan (spec §4.11 step 4).
    pub async fn clear_repository_recommendations(&self, repository_id: &str) -> PersistenceResult<()> {
        sqlx::query("DELETE FROM repository_recommendations WHERE repository_id = ? AND status = 'active'")
            .bind(repository_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_active_recommendations(
        &self,
        repository_id: &str,
    ) -> PersistenceResult<Vec<Recommendation>> {
        let rows = sqlx::query_as::<_, RecommendationRow>(
            "SELECT * FROM repository_recommendations WHERE repository_id = ? AND status = 'active'",
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let id_for_log = r.id.clone();
                let decoded = r.into_domain();
                if decoded.is_none() {
                    warn!("dropping recommendation {id_for_log} with undecodable enum column");
                }
                decoded
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisStatus, RecommendationMetrics, RecommendationStatus};
    use std::collections::{HashMap, HashSet};

    async fn test_db() -> Database {
        let pool = connect("sqlite::memory:").await.unwrap();
        Database::new(pool)
    }

    fn sample_repository(id: &str) -> Repository {
        Repository {
            id: id.to_string(),
            full_name: "acme/widgets".to_string(),
            default_branch: "main".to_string(),
            primary_language: Some("TypeScript".to_string()),
            tech_stack_profile: Some("general-typescript".to_string()),
            categories: HashSet::new(),
            branches: vec!["main".to_string()],
            patterns_count: 0,
            analysis_status: AnalysisStatus::Pending,
            last_analyzed: None,
            metadata: HashMap::new(),
        }
    }

    fn sample_recommendation(repository_id: &str, title: &str) -> Recommendation {
        let now = Utc::now();
        Recommendation {
            id: uuid::Uuid::new_v4().to_string(),
            repository_id: repository_id.to_string(),
            title: title.to_string(),
            description: "desc".to_string(),
            recommendation_type: RecommendationType::Security,
            priority: Priority::High,
            applicable_patterns: HashSet::new(),
            code_examples: Vec::new(),
            implementation_steps: Vec::new(),
            estimated_effort: "1h".to_string(),
            tags: HashSet::new(),
            status: RecommendationStatus::Active,
            metrics: RecommendationMetrics::default(),
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_repository_round_trips() {
        let db = test_db().await;
        let repo = sample_repository("r1");
        db.upsert_repository(&repo).await.unwrap();
        let fetched = db.get_repository("r1").await.unwrap().unwrap();
        assert_eq!(fetched.full_name, "acme/widgets");
    }

    #[tokio::test]
    async fn insert_recommendations_unique_skips_existing_and_intra_batch_duplicates() {
        let db = test_db().await;
        let r1 = sample_recommendation("r1", "Fix Security Hole");
        let r2 = sample_recommendation("r1", "Fix Security Hole");
        let inserted_first_pass = db
            .insert_recommendations_unique(&[r1.clone()])
            .await
            .unwrap();
        assert_eq!(inserted_first_pass, 1);

        let inserted_second_pass = db
            .insert_recommendations_unique(&[r2.clone(), r2])
            .await
            .unwrap();
        assert_eq!(inserted_second_pass, 0);

        let active = db.list_active_recommendations("r1").await.unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn aging_moves_old_recommendations_to_outdated() {
        let db = test_db().await;
        let mut old = sample_recommendation("r1", "Old One");
        old.created_at = Utc::now() - chrono::Duration::days(31);
        let mut fresh = sample_recommendation("r1", "Fresh One");
        fresh.created_at = Utc::now() - chrono::Duration::days(29);

        db.insert_recommendations_unique(&[old, fresh]).await.unwrap();
        let cutoff = Utc::now() - chrono::Duration::days(30);
        let aged = db.age_stale_recommendations(cutoff).await.unwrap();
        assert_eq!(aged, 1);

        let active = db.list_active_recommendations("r1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "Fresh One");
    }

    #[tokio::test]
    async fn replace_patterns_is_exact() {
        let db = test_db().await;
        let pattern = Pattern {
            id: "p1".to_string(),
            repository_id: "r1".to_string(),
            pattern_type: "import_statement".to_string(),
            category: "structure".to_string(),
            subcategory: "import".to_string(),
            content: "import a from 'a'".to_string(),
            content_hash: "abc".to_string(),
            file_path: "a.ts".to_string(),
            line_start: 1,
            line_end: 1,
            language: "TypeScript".to_string(),
            confidence: 0.8,
            tags: HashSet::new(),
            context_before: String::new(),
            context_after: String::new(),
            metadata: HashMap::new(),
        };
        db.replace_patterns("r1", &[pattern.clone()]).await.unwrap();
        db.replace_patterns("r1", &[pattern]).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM repository_patterns WHERE repository_id = 'r1'")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
