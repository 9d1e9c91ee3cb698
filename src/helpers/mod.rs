pub mod task;
pub mod time;
