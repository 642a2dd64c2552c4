pub mod blog;
pub mod image;
pub mod review;
pub mod user;
pub mod user_token;
