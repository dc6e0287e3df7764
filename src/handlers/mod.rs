pub mod account;
pub mod goals;
pub mod health;
pub mod leaderboard;
pub mod levels;
pub mod progression;
