pub mod auth;
pub mod cli;
pub mod config;
pub mod menu;
pub mod services;
pub mod session;
pub mod storage;

pub use menu::{MenuNode, MenuProvider, MenuTree, ProviderState};
pub use session::{RoleLevel, Session, SessionStore, UserProfile};
