pub mod common;

mod cache_refresh;
mod health_probe;
mod stores;
mod upstream_retry;
