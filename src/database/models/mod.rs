pub mod entry;
pub mod following;
pub mod profile;
pub mod user;
pub mod user_key;

// Re-export all models for easy importing
pub use entry::*;
pub use following::*;
pub use profile::*;
pub use user::*;
pub use user_key::*;
