pub mod entry;
pub mod following;
pub mod profile;
pub mod user;
pub mod user_key;

// Re-export all repositories for easy importing
pub use entry::EntryRepository;
pub use following::FollowingRepository;
pub use profile::ProfileRepository;
pub use user::UserRepository;
pub use user_key::UserKeyRepository;
