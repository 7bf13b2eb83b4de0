pub mod auth;
pub mod clubs;
pub mod conversations;
pub mod error;
pub mod identity;
pub mod messages;
pub mod middleware;
pub mod policy;
pub mod router;
