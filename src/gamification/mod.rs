/// Gamification: points, levels, badges, and challenges
use crate::{
    db::models::{Challenge, UserProgress},
    error::{is_unique_violation, AppError, AppResult},
};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

/// Points per level step
const POINTS_PER_LEVEL: i64 = 100;

/// Points awarded for entering a challenge
const CHALLENGE_ENTRY_POINTS: i64 = 15;

/// A user's gamification summary
#[derive(Debug, Serialize)]
pub struct ProgressView {
    pub points: i64,
    pub level: i64,
    pub prompts_created: i64,
    pub likes_received: i64,
    pub forks_received: i64,
    pub badges: Vec<&'static str>,
}

/// Gamification manager service
pub struct GamificationManager {
    db: SqlitePool,
}

impl GamificationManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Progress summary with derived level and badges
    pub async fn progress(&self, user_id: &str) -> AppResult<ProgressView> {
        let progress =
            sqlx::query_as::<_, UserProgress>("SELECT * FROM user_progress WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(ProgressView {
            points: progress.points,
            level: level_for(progress.points),
            prompts_created: progress.prompts_created,
            likes_received: progress.likes_received,
            forks_received: progress.forks_received,
            badges: badges_for(&progress),
        })
    }

    /// Challenges whose window contains now
    pub async fn active_challenges(&self) -> AppResult<Vec<Challenge>> {
        let now = Utc::now();
        let challenges = sqlx::query_as::<_, Challenge>(
            "SELECT * FROM challenges WHERE starts_at <= ?1 AND ends_at > ?1 ORDER BY ends_at ASC",
        )
        .bind(now)
        .fetch_all(&self.db)
        .await?;
        Ok(challenges)
    }

    /// Submit a prompt to an active challenge. One entry per user per
    /// challenge; the prompt must belong to the entrant.
    pub async fn enter_challenge(
        &self,
        challenge_id: &str,
        prompt_id: &str,
        user_id: &str,
    ) -> AppResult<()> {
        let now = Utc::now();

        let challenge =
            sqlx::query_as::<_, Challenge>("SELECT * FROM challenges WHERE id = ?1")
                .bind(challenge_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Challenge not found".to_string()))?;

        if now < challenge.starts_at || now >= challenge.ends_at {
            return Err(AppError::Validation("Challenge is not active".to_string()));
        }

        let author: Option<String> =
            sqlx::query_scalar("SELECT author_id FROM prompts WHERE id = ?1")
                .bind(prompt_id)
                .fetch_optional(&self.db)
                .await?;
        match author {
            None => return Err(AppError::NotFound(format!("Prompt not found: {}", prompt_id))),
            Some(a) if a != user_id => {
                return Err(AppError::Authorization(
                    "Only your own prompts can be entered".to_string(),
                ))
            }
            _ => {}
        }

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO challenge_entries (challenge_id, prompt_id, user_id, submitted_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(challenge_id)
        .bind(prompt_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(ref db_err)) = inserted {
            if is_unique_violation(db_err.as_ref()) {
                return Err(AppError::AlreadyExists("Already entered this challenge".to_string()));
            }
        }
        inserted?;

        sqlx::query(
            "UPDATE user_progress SET points = points + ?2, updated_at = ?3 WHERE user_id = ?1",
        )
        .bind(user_id)
        .bind(CHALLENGE_ENTRY_POINTS)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

fn level_for(points: i64) -> i64 {
    points / POINTS_PER_LEVEL + 1
}

/// Badges are derived from counters at read time, never stored
fn badges_for(progress: &UserProgress) -> Vec<&'static str> {
    let mut badges = Vec::new();
    if progress.prompts_created >= 1 {
        badges.push("first_prompt");
    }
    if progress.prompts_created >= 10 {
        badges.push("ten_prompts");
    }
    if progress.likes_received >= 25 {
        badges.push("popular");
    }
    if progress.forks_received >= 5 {
        badges.push("remixed");
    }
    badges
}
