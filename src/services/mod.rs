pub mod goals;
pub mod leaderboard;
pub mod progression;
pub mod quiz;
