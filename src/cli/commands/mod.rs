pub mod auth;
pub mod menu;
