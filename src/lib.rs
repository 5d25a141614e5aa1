pub mod aggregate;
pub mod availability;
pub mod config;
pub mod data_access;
pub mod defense_strength;
pub mod error;
pub mod fake_season;
pub mod game_keys;
pub mod logging;
pub mod matchup;
pub mod pipeline;
pub mod play;
pub mod play_store;
pub mod qb_production;
pub mod rank_keys;
pub mod score_model;
pub mod turnover_regression;
