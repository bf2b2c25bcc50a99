pub mod aggregator;
pub mod best_odds;
pub mod data;
pub mod filters;
pub mod live;
pub mod odds_format;
pub mod pagination;
pub mod ranking;
pub mod repository;
