pub mod auth;
pub mod billing;
pub mod generation;
pub mod health;
pub mod leads;
pub mod profile;
pub mod stores;
pub mod usage;
pub mod webhooks;
