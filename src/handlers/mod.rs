pub mod analytics;
pub mod auth;
pub mod entries;
pub mod health;
pub mod users;
