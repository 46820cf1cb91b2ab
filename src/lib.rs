pub mod aggregate;
pub mod api;
pub mod classify;
pub mod clash;
pub mod config;
pub mod delivery;
pub mod fetch;
pub mod humanize;
pub mod link;
pub mod model;
pub mod observability;
pub mod store;
