/// Teams and membership
use crate::{
    db::models::{Team, TeamMember},
    error::{is_unique_violation, AppError, AppResult},
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Membership roles within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamRole {
    Owner,
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Member => "member",
        }
    }
}

/// Team manager service
pub struct TeamManager {
    db: SqlitePool,
}

impl TeamManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a team; the creator becomes its owner member
    pub async fn create(&self, owner_id: &str, name: &str) -> AppResult<Team> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Team name cannot be empty".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        sqlx::query("INSERT INTO teams (id, name, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&id)
            .bind(name)
            .bind(owner_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(TeamRole::Owner.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Team {
            id,
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            created_at: now,
        })
    }

    /// Teams the user belongs to
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Team>> {
        let teams = sqlx::query_as::<_, Team>(
            "SELECT t.* FROM teams t
             JOIN team_members m ON m.team_id = t.id
             WHERE m.user_id = ?1
             ORDER BY t.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(teams)
    }

    /// Members of a team, visible to members only
    pub async fn members(&self, team_id: &str, viewer: &str) -> AppResult<Vec<TeamMember>> {
        if !self.is_member(team_id, viewer).await? {
            return Err(AppError::NotFound("Team not found".to_string()));
        }

        let members = sqlx::query_as::<_, TeamMember>(
            "SELECT * FROM team_members WHERE team_id = ?1 ORDER BY joined_at ASC",
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await?;
        Ok(members)
    }

    /// Add a member. Owner-only; duplicate membership conflicts.
    pub async fn add_member(&self, team_id: &str, user_id: &str, actor: &str) -> AppResult<()> {
        self.require_owner(team_id, actor).await?;

        let result = sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(team_id)
        .bind(user_id)
        .bind(TeamRole::Member.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        if let Err(sqlx::Error::Database(ref db_err)) = result {
            if is_unique_violation(db_err.as_ref()) {
                return Err(AppError::AlreadyExists("Already a member".to_string()));
            }
        }
        result?;

        Ok(())
    }

    /// Remove a member. Owner-only; the owner cannot be removed.
    pub async fn remove_member(&self, team_id: &str, user_id: &str, actor: &str) -> AppResult<()> {
        let team = self.require_owner(team_id, actor).await?;

        if user_id == team.owner_id {
            return Err(AppError::Validation(
                "The team owner cannot be removed".to_string(),
            ));
        }

        sqlx::query("DELETE FROM team_members WHERE team_id = ?1 AND user_id = ?2")
            .bind(team_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn is_member(&self, team_id: &str, user_id: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM team_members WHERE team_id = ?1 AND user_id = ?2",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count > 0)
    }

    async fn require_owner(&self, team_id: &str, user_id: &str) -> AppResult<Team> {
        let team = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?1")
            .bind(team_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Team not found".to_string()))?;

        if team.owner_id != user_id {
            return Err(AppError::Authorization(
                "Only the team owner may do this".to_string(),
            ));
        }

        Ok(team)
    }
}
