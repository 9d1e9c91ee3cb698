pub mod datasets;
pub mod gateway;
