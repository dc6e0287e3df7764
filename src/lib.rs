pub mod cache;
pub mod config;
pub mod db;
pub mod extractors;
pub mod generator;
pub mod handlers;
pub mod models;
pub mod names;
pub mod rejections;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::Router;

use crate::cache::LeaderboardCache;
use crate::config::Policy;
use crate::generator::OpenAiGenerator;
use crate::services::{
    goals::{GoalService, RoadmapGenerator},
    leaderboard::LeaderboardService,
    progression::ProgressionService,
    quiz::QuizService,
};

pub struct AppState<G: RoadmapGenerator = OpenAiGenerator> {
    pub db: db::Db,
    pub goals: GoalService<db::Db, G>,
    pub progression: ProgressionService,
    pub quizzes: QuizService,
    pub leaderboard: LeaderboardService,
}

impl<G: RoadmapGenerator + Clone> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            goals: self.goals.clone(),
            progression: self.progression.clone(),
            quizzes: self.quizzes.clone(),
            leaderboard: self.leaderboard.clone(),
        }
    }
}

impl<G: RoadmapGenerator> AppState<G> {
    /// Wire every service to one database handle. A zero leaderboard TTL
    /// turns the cache off and every read goes to storage.
    pub fn new(db: db::Db, generator: G, policy: Policy) -> Self {
        let cache = (!policy.leaderboard_ttl.is_zero())
            .then(|| Arc::new(LeaderboardCache::new(policy.leaderboard_ttl)));

        Self {
            goals: GoalService::new(db.clone(), generator, policy.clone()),
            progression: ProgressionService::new(db.clone()),
            quizzes: QuizService::new(db.clone(), policy.clone(), cache.clone()),
            leaderboard: LeaderboardService::new(db.clone(), cache, policy.leaderboard_size),
            db,
        }
    }
}

pub fn router<G: RoadmapGenerator + Clone + 'static>(state: AppState<G>) -> Router {
    Router::new()
        .merge(handlers::account::routes::<G>())
        .merge(handlers::goals::routes::<G>())
        .merge(handlers::levels::routes::<G>())
        .merge(handlers::progression::routes::<G>())
        .merge(handlers::leaderboard::routes::<G>())
        .merge(handlers::health::routes::<G>())
        .with_state(state)
}
