pub mod dates;
pub mod models;
pub mod payload;
pub mod sleep_score;
pub mod token;
