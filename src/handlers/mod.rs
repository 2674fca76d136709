pub mod auth;
pub mod autocomplete;
pub mod dates;
pub mod following;
pub mod mobile;
pub mod shared;
