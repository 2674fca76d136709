use actix_web::web;

pub mod auth;
pub mod autocomplete;
pub mod dates;
pub mod following;
pub mod mobile;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(auth::configure)
        .configure(dates::configure)
        .configure(following::configure)
        .configure(autocomplete::configure)
        .configure(mobile::configure);
}
