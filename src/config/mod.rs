pub mod proc_initiateor;
pub mod proc_loader;
pub mod proc_validator;
pub mod schedule;
pub mod settings;
pub mod sources;
pub mod storage;
