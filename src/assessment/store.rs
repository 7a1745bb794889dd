// src/assessment/store.rs

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    assessment::mastery::{self, Outcome},
    error::AppError,
    models::topic::{TopicRecord, TopicRow},
};

const SELECT_COLUMNS: &str = r#"
    SELECT
        name,
        explanation_summary,
        mastery_score,
        questions_attempted,
        correct_answers,
        classification,
        last_assessed,
        created_at
    FROM topic_records
"#;

/// Durable per-user mapping from topic name to mastery state.
///
/// Names are matched case-insensitively; the stored `name` keeps the casing
/// the topic was first taught with.
#[derive(Clone)]
pub struct TopicStore {
    pool: SqlitePool,
}

impl TopicStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a taught topic. Returns the record and whether it was newly created;
    /// an existing topic is returned untouched.
    pub async fn teach(
        &self,
        user_id: &str,
        name: &str,
        explanation_summary: &str,
    ) -> Result<(TopicRecord, bool), AppError> {
        let name = name.trim();
        let inserted = sqlx::query(
            r#"
            INSERT INTO topic_records (user_id, name_key, name, explanation_summary, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(user_id, name_key) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(name_key(name))
        .bind(name)
        .bind(explanation_summary)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert topic record: {:?}", e);
            AppError::from(e)
        })?
        .rows_affected()
            > 0;

        let record = self.get(user_id, name).await?;
        Ok((record, inserted))
    }

    /// Fetches a topic's record; `UnknownTopic` if it was never taught.
    pub async fn get(&self, user_id: &str, name: &str) -> Result<TopicRecord, AppError> {
        let row = sqlx::query_as::<_, TopicRow>(&format!(
            "{} WHERE user_id = $1 AND name_key = $2",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(name_key(name))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::UnknownTopic(name.trim().to_string()))?;

        TopicRecord::try_from(row).map_err(AppError::InternalServerError)
    }

    /// All taught topics in teaching order.
    pub async fn list(&self, user_id: &str) -> Result<Vec<TopicRecord>, AppError> {
        let rows = sqlx::query_as::<_, TopicRow>(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at, rowid",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| TopicRecord::try_from(row).map_err(AppError::InternalServerError))
            .collect()
    }

    pub async fn has_topics(&self, user_id: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topic_records WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Applies one scored outcome inside a transaction and returns the new record.
    ///
    /// Callers hold the user's lock; this is the only write path for mastery.
    pub async fn update(
        &self,
        user_id: &str,
        name: &str,
        outcome: Outcome,
    ) -> Result<TopicRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TopicRow>(&format!(
            "{} WHERE user_id = $1 AND name_key = $2",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(name_key(name))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::UnknownTopic(name.trim().to_string()))?;
        let previous = TopicRecord::try_from(row).map_err(AppError::InternalServerError)?;

        let update = mastery::apply(&previous, outcome);
        let assessed_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE topic_records SET
                mastery_score = $1,
                questions_attempted = $2,
                correct_answers = $3,
                classification = $4,
                last_assessed = $5
            WHERE user_id = $6 AND name_key = $7
            "#,
        )
        .bind(update.mastery_score)
        .bind(update.questions_attempted)
        .bind(update.correct_answers)
        .bind(update.classification.as_str())
        .bind(assessed_at)
        .bind(user_id)
        .bind(name_key(name))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update topic record: {:?}", e);
            AppError::from(e)
        })?;

        tx.commit().await?;

        let record = TopicRecord {
            mastery_score: update.mastery_score,
            questions_attempted: update.questions_attempted,
            correct_answers: update.correct_answers,
            classification: update.classification,
            last_assessed: Some(assessed_at),
            ..previous
        };

        tracing::info!(
            user_id,
            topic = %record.name,
            attempted = record.questions_attempted,
            correct = record.correct_answers,
            mastery = record.mastery_score,
            classification = record.classification.as_str(),
            "Mastery updated"
        );

        Ok(record)
    }

    /// Deletes every record for the user. Returns the number of topics removed.
    pub async fn reset(&self, user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM topic_records WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Case-insensitive lookup key for a topic name.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

