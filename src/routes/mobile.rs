use actix_web::web;

use crate::handlers::mobile;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/mobile")
            .route("/right-now", web::get().to(mobile::right_now))
            .route("/taken", web::get().to(mobile::taken))
            .route("/notify", web::post().to(mobile::notify))
            .route("/hours", web::get().to(mobile::hours_json))
            .route("/hours", web::post().to(mobile::save_hours))
            .route("/settings", web::get().to(mobile::settings_json))
            .route("/settings", web::post().to(mobile::save_settings))
            .route("/login", web::get().to(mobile::login_status))
            .route("/login", web::post().to(mobile::login))
            .route("/logout", web::post().to(mobile::logout)),
    );
}
