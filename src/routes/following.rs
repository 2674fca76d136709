use actix_web::web;

use crate::handlers::following;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/following")
            .route("", web::get().to(following::following))
            .route("/follow", web::post().to(following::save_following))
            .route("/unfollow", web::post().to(following::save_unfollowing)),
    );
}
