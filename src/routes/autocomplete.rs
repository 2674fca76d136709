use actix_web::web;

use crate::handlers::autocomplete;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/autocomplete")
            .route("/users", web::get().to(autocomplete::users))
            .route("/users/known", web::get().to(autocomplete::known_users))
            .route("/cities", web::get().to(autocomplete::cities)),
    );
}
