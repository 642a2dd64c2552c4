pub mod account;
pub mod blob;
pub mod blog;
pub mod review;
