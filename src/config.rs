use std::time::Duration;

use color_eyre::{eyre::ensure, Result};

use crate::names;

/// Tunable rules of the progression engine. Everything that decides whether
/// a learner passes, how much XP a level is worth when the roadmap does not
/// say, and how stale the leaderboard may get comes from here.
#[derive(Debug, Clone)]
pub struct Policy {
    pub pass_threshold: f64,
    pub default_xp_reward: i64,
    pub leaderboard_ttl: Duration,
    pub leaderboard_size: i64,
    pub quiz_time_limit_secs: i64,
}

impl Policy {
    pub fn new(
        pass_threshold: f64,
        default_xp_reward: i64,
        leaderboard_ttl: Duration,
        leaderboard_size: i64,
    ) -> Result<Self> {
        ensure!(
            pass_threshold > 0.0 && pass_threshold <= 1.0,
            "pass threshold must be in (0, 1], got {pass_threshold}"
        );
        ensure!(
            default_xp_reward > 0,
            "default XP reward must be positive, got {default_xp_reward}"
        );
        ensure!(
            (1..=names::MAX_LEADERBOARD_SIZE).contains(&leaderboard_size),
            "leaderboard size must be within 1..={}, got {leaderboard_size}",
            names::MAX_LEADERBOARD_SIZE
        );

        Ok(Self {
            pass_threshold,
            default_xp_reward,
            leaderboard_ttl,
            leaderboard_size,
            quiz_time_limit_secs: names::QUIZ_TIME_LIMIT_SECS,
        })
    }

    pub fn with_pass_threshold(mut self, pass_threshold: f64) -> Self {
        self.pass_threshold = pass_threshold;
        self
    }

    pub fn with_leaderboard_ttl(mut self, ttl: Duration) -> Self {
        self.leaderboard_ttl = ttl;
        self
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            pass_threshold: names::DEFAULT_PASS_THRESHOLD,
            default_xp_reward: names::DEFAULT_XP_REWARD,
            leaderboard_ttl: Duration::from_secs(names::DEFAULT_LEADERBOARD_TTL_SECS),
            leaderboard_size: names::DEFAULT_LEADERBOARD_SIZE,
            quiz_time_limit_secs: names::QUIZ_TIME_LIMIT_SECS,
        }
    }
}
