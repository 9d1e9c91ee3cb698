pub mod manager;
pub mod oauth2;
pub mod token;
