use actix_web::{http::StatusCode, test};
use chrono::{Days, Utc};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use pto::database::models::User;
use pto::services::hours::{field_name, weekday_dates};

#[macro_use]
mod common;

use common::{TestContext, future_monday, iso};

async fn seeded() -> (TestContext, User, User) {
    common::setup_test_env();
    let ctx = TestContext::new().await.unwrap();
    let laura = ctx.user("laura", "Laura", "Thomson", None).await;
    let peter = ctx
        .user("peter", "Peter", "Bengtsson", Some("laura@mozilla.com"))
        .await;
    (ctx, laura, peter)
}

#[actix_web::test]
async fn test_endpoints_report_missing_session() {
    let (ctx, _, peter) = seeded().await;
    let app = test_app!(ctx);

    for uri in ["/mobile/right-now", "/mobile/taken", "/mobile/settings", "/mobile/hours"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK, "{}", uri);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body, json!({ "error": "Not logged in" }), "{}", uri);
    }

    let req = test::TestRequest::get().uri("/mobile/login").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "logged_in": false }));

    let req = test::TestRequest::get()
        .uri("/mobile/login")
        .insert_header(ctx.bearer(&peter))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "logged_in": true }));
}

#[actix_web::test]
async fn test_login_form() {
    let (ctx, _, _) = seeded().await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/mobile/login")
        .set_form([("username", "peter@mozilla.com"), ("password", common::PASSWORD)])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["ok"], true);
    assert!(body["token"].is_string());

    let req = test::TestRequest::post()
        .uri("/mobile/login")
        .set_form([("username", "peter@mozilla.com"), ("password", "nope")])
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert!(body["form_errors"]["__all__"].is_array());
}

#[actix_web::test]
async fn test_notify_and_save_hours() {
    let (ctx, _, peter) = seeded().await;
    let app = test_app!(ctx);
    let monday = future_monday();
    let tuesday = monday + Days::new(1);

    let req = test::TestRequest::post()
        .uri("/mobile/notify")
        .insert_header(ctx.bearer(&peter))
        .set_form([("start", iso(monday)), ("end", String::new())])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["form_errors"]["end"][0], "This field is required.");

    let req = test::TestRequest::post()
        .uri("/mobile/notify")
        .insert_header(ctx.bearer(&peter))
        .set_form([("start", iso(monday)), ("end", iso(tuesday))])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let entry_id = body["entry"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/mobile/hours?entry={}", entry_id))
        .insert_header(ctx.bearer(&peter))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body[0]["key"], field_name(monday));
    assert_eq!(body[0]["value"], 8);
    assert!(body[1]["full_day"].is_string());

    let mut form: Vec<(String, String)> = weekday_dates(monday, tuesday)
        .into_iter()
        .map(|day| (field_name(day), "8".to_string()))
        .collect();
    form.push(("entry".to_string(), entry_id.to_string()));
    let req = test::TestRequest::post()
        .uri("/mobile/hours")
        .insert_header(ctx.bearer(&peter))
        .set_form(&form)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "ok": true }));

    let entry = ctx.state.entries.find_by_id(entry_id).await.unwrap().unwrap();
    assert_eq!(entry.total_hours, Some(16));
    assert_eq!(ctx.outbox.messages().len(), 1);
}

#[actix_web::test]
async fn test_hours_access() {
    let (ctx, laura, peter) = seeded().await;
    let monday = future_monday();
    let entry = ctx.logged_entry(&peter, monday, monday, "", 8).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/mobile/hours")
        .insert_header(ctx.bearer(&peter))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "error": "No entry pre-loaded" }));

    let req = test::TestRequest::post()
        .uri("/mobile/hours")
        .insert_header(ctx.bearer(&peter))
        .set_form([(field_name(monday), "8".to_string())])
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/mobile/hours")
        .insert_header(ctx.bearer(&laura))
        .set_form([("entry", entry.id.to_string())])
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_settings_round_trip() {
    let (ctx, _, peter) = seeded().await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/mobile/settings")
        .insert_header(ctx.bearer(&peter))
        .set_form([("city", "Paris"), ("country", "FR")])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "ok": true }));

    let req = test::TestRequest::get()
        .uri("/mobile/settings")
        .insert_header(ctx.bearer(&peter))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!({
            "username": "peter",
            "email": "peter@mozilla.com",
            "full_name": "Peter Bengtsson <peter@mozilla.com>",
            "country": "FR",
            "city": "Paris",
        })
    );

    let req = test::TestRequest::get()
        .uri("/mobile/taken")
        .insert_header(ctx.bearer(&peter))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["country"], "FR");

    let req = test::TestRequest::post()
        .uri("/mobile/settings")
        .insert_header(ctx.bearer(&peter))
        .set_form([("city", "Paris"), ("country", "France")])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["form_errors"]["country"].is_array());
}

#[actix_web::test]
async fn test_right_now_and_upcoming() {
    let (ctx, laura, peter) = seeded().await;
    let today = Utc::now().date_naive();
    ctx.logged_entry(&peter, today, today + Days::new(3), "", 8)
        .await;
    ctx.logged_entry(&peter, today + Days::new(5), today + Days::new(9), "", 8)
        .await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/mobile/right-now")
        .insert_header(ctx.bearer(&laura))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["now"][0]["name"], "Peter Bengtsson");
    assert_eq!(body["now"][0]["email"], "peter@mozilla.com");
    let now = body["now"][0]["descriptions"][0].as_str().unwrap();
    assert!(now.starts_with("ends in 3 days on "), "{}", now);

    let upcoming = body["upcoming"][0]["descriptions"][0].as_str().unwrap();
    assert!(upcoming.starts_with("starts in 5 days on "), "{}", upcoming);
}
