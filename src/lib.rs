pub mod config;
pub mod draw;
pub mod fetcher;
pub mod reconcile;
pub mod store;
