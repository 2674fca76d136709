use actix_web::web;

use crate::handlers::dates;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/dates")
            .route("", web::get().to(dates::dashboard))
            .route("/notify", web::get().to(dates::notify_info))
            .route("/notify", web::post().to(dates::notify))
            .route("/notify/cancel", web::post().to(dates::cancel_notify))
            .route("/hours/{entry_id}", web::get().to(dates::hours_form))
            .route("/hours/{entry_id}", web::post().to(dates::save_hours))
            .route("/emails-sent", web::get().to(dates::emails_sent))
            .route("/calendar/events", web::get().to(dates::calendar_events))
            .route("/calendar/url", web::get().to(dates::calendar_url))
            .route(
                "/calendar/url/reset",
                web::post().to(dates::reset_calendar_url),
            )
            .route("/list", web::get().to(dates::list))
            .route("/list/json", web::get().to(dates::list_json))
            .route("/list/csv", web::get().to(dates::list_csv))
            .route("/duplicates", web::get().to(dates::duplicate_report))
            .route("/{key}/ptocalendar.ics", web::get().to(dates::calendar_feed)),
    );
}
