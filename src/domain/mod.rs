pub mod engagement;
pub mod moderation;
pub mod notification;
pub mod requests;
pub mod shoutout;
pub mod user;
