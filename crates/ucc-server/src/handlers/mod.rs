pub mod compare;
pub mod health;
pub mod jobs;
pub mod preprocess;
pub mod ws;
