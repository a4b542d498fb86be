pub mod admin;
pub mod tasks;
pub mod user;
pub mod verify;
