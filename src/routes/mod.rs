//! HTTP route handlers for the Plaza API.
//!
//! - `admin`: moderation views (staff only)
//! - `health`: liveness, readiness, metrics and version endpoints
//! - `posts`: the post feed, single posts and their comments
//! - `users`: registration, profiles and follow relationships

pub mod admin;
pub mod health;
pub mod posts;
pub mod users;
