//! External collaborators of the blog server: blob storage and email delivery.

pub mod config;
pub mod mail;
pub mod storage;
