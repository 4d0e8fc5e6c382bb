//! Student performance scoring: per-request cohort features, grade and tier
//! prediction, and quartile-based recommendations.

pub mod cohort;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod models;
pub mod predictor;
pub mod provider;
pub mod recommend;
pub mod report;
pub mod scoring;
pub mod server;
