pub mod checker;
pub mod scheduler;
