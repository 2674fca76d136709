pub mod auth;
pub mod calendar;
pub mod dashboard;
pub mod export;
pub mod following;
pub mod forms;
pub mod hours;
pub mod notifier;
pub mod org_chart;

pub use auth::AuthService;
pub use following::FollowingService;
pub use notifier::{Mailer, Notifier};
pub use org_chart::OrgChart;
