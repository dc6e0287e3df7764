pub const REGISTER_URL: &str = "/register";
pub const GOALS_URL: &str = "/goals";
pub const LEADERBOARD_URL: &str = "/leaderboard";
pub const STATS_URL: &str = "/progression/stats";
pub const ME_URL: &str = "/users/me";
pub const HEALTH_URL: &str = "/health";
pub const HEALTH_READY_URL: &str = "/health/ready";
pub const HEALTH_LIVE_URL: &str = "/health/live";

pub const USER_SESSION_COOKIE_NAME: &str = "user_session";

pub fn goal_url(goal_id: i64) -> String {
    format!("/goals/{goal_id}")
}

pub fn archive_goal_url(goal_id: i64) -> String {
    format!("/goals/{goal_id}/archive")
}

pub fn level_url(level_id: i64) -> String {
    format!("/levels/{level_id}")
}

pub fn complete_topic_url(level_id: i64, topic_index: i64) -> String {
    format!("/levels/{level_id}/topics/{topic_index}/complete")
}

pub fn quiz_url(level_id: i64) -> String {
    format!("/levels/{level_id}/quiz")
}

pub fn submit_quiz_url(level_id: i64) -> String {
    format!("/levels/{level_id}/quiz/submit")
}

// Policy defaults
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.7;
pub const DEFAULT_XP_REWARD: i64 = 100;
pub const DEFAULT_LEADERBOARD_TTL_SECS: u64 = 30;
pub const DEFAULT_LEADERBOARD_SIZE: i64 = 10;
pub const MAX_LEADERBOARD_SIZE: i64 = 100;
pub const LEADERBOARD_CACHE_MAX_ENTRIES: usize = 10_000;
pub const QUIZ_TIME_LIMIT_SECS: i64 = 300;

pub const MAX_DISPLAY_NAME_LEN: usize = 50;

// Goal description bounds
pub const MIN_GOAL_DESCRIPTION_LEN: usize = 10;
pub const MAX_GOAL_DESCRIPTION_LEN: usize = 500;

// Experience needed per level step, see `services::progression::experience_level`
pub const EXP_PER_LEVEL_UNIT: i64 = 100;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
