pub mod admin;
pub mod auth;
pub mod engagement;
pub mod moderation;
pub mod notifications;
pub mod shoutouts;
pub mod users;
