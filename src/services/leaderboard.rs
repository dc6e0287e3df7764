use std::sync::Arc;

use color_eyre::Result;
use serde::Serialize;

use crate::cache::LeaderboardCache;
use crate::db::models::{AuthUser, LeaderboardEntry, RankedUser};
use crate::db::Db;
use crate::names::MAX_LEADERBOARD_SIZE;
use crate::rejections::{AppError, ResultExt};
use crate::services::progression::experience_level;

// ---------------------------------------------------------------------------
// LeaderboardRepository trait (DIP: service defines the abstraction it needs)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait LeaderboardRepository: Send + Sync {
    fn rank_of(&self, user_id: i64) -> impl std::future::Future<Output = Result<Option<i64>>> + Send;

    fn top_users(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<RankedUser>>> + Send;

    fn get_user(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<AuthUser>>> + Send;
}

impl LeaderboardRepository for Db {
    fn rank_of(&self, user_id: i64) -> impl std::future::Future<Output = Result<Option<i64>>> + Send {
        Db::rank_of(self, user_id)
    }

    fn top_users(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<RankedUser>>> + Send {
        Db::top_users(self, limit)
    }

    fn get_user(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<AuthUser>>> + Send {
        Db::get_user(self, user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    pub me: LeaderboardEntry,
}

// ---------------------------------------------------------------------------
// LeaderboardService
// ---------------------------------------------------------------------------

/// Ranks users by XP. Reads go through the shared cache when there is one
/// and straight to storage otherwise; both paths return the same ordering.
pub struct LeaderboardService<R: LeaderboardRepository = Db> {
    repo: R,
    cache: Option<Arc<LeaderboardCache>>,
    default_size: i64,
}

impl<R: LeaderboardRepository + Clone> Clone for LeaderboardService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            cache: self.cache.clone(),
            default_size: self.default_size,
        }
    }
}

impl<R: LeaderboardRepository> LeaderboardService<R> {
    pub fn new(repo: R, cache: Option<Arc<LeaderboardCache>>, default_size: i64) -> Self {
        Self {
            repo,
            cache,
            default_size,
        }
    }

    pub fn default_size(&self) -> i64 {
        self.default_size
    }

    /// 1-based position of `user_id`, ties broken by account age.
    pub async fn rank_of(&self, user_id: i64) -> Result<i64, AppError> {
        let generation = self.cache.as_ref().map(|c| c.generation());
        if let Some(rank) = self.cache.as_ref().and_then(|c| c.rank(user_id)) {
            tracing::debug!("rank cache hit: user_id={user_id}");
            return Ok(rank);
        }

        let rank = self
            .repo
            .rank_of(user_id)
            .await
            .reject("could not compute rank")?
            .ok_or(AppError::NotFound)?;

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            cache.store_rank(user_id, rank, generation);
        }
        Ok(rank)
    }

    /// The `n` best users, `n` clamped to `1..=100`.
    pub async fn top_n(&self, n: i64) -> Result<Vec<LeaderboardEntry>, AppError> {
        let limit = n.clamp(1, MAX_LEADERBOARD_SIZE);

        let generation = self.cache.as_ref().map(|c| c.generation());
        if let Some(entries) = self.cache.as_ref().and_then(|c| c.top(limit)) {
            tracing::debug!("leaderboard cache hit: limit={limit}");
            return Ok(entries);
        }

        let entries: Vec<LeaderboardEntry> = self
            .repo
            .top_users(limit)
            .await
            .reject("could not load leaderboard")?
            .into_iter()
            .enumerate()
            .map(|(i, user)| LeaderboardEntry {
                rank: i as i64 + 1,
                user_id: user.id,
                display_name: user.display_name,
                total_exp: user.total_exp,
                level: experience_level(user.total_exp),
            })
            .collect();

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            cache.store_top(limit, entries.clone(), generation);
        }
        Ok(entries)
    }

    /// Top `n` (or the configured default) plus the caller's own standing.
    pub async fn leaderboard(&self, user_id: i64, n: Option<i64>) -> Result<Leaderboard, AppError> {
        let entries = self.top_n(n.unwrap_or(self.default_size)).await?;

        let me = match entries.iter().find(|e| e.user_id == user_id) {
            Some(entry) => entry.clone(),
            None => {
                let user = self
                    .repo
                    .get_user(user_id)
                    .await
                    .reject("could not load user")?
                    .ok_or(AppError::NotFound)?;
                LeaderboardEntry {
                    rank: self.rank_of(user_id).await?,
                    user_id,
                    level: experience_level(user.total_exp),
                    display_name: user.display_name,
                    total_exp: user.total_exp,
                }
            }
        };

        Ok(Leaderboard { entries, me })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
