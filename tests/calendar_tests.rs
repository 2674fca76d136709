use actix_web::{http::StatusCode, test};
use chrono::{Days, NaiveDate};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use pto::services::calendar::{COLORS, HIDDEN_DETAILS};

#[macro_use]
mod common;

use common::{TestContext, future_monday};

fn epoch_seconds(day: NaiveDate) -> i64 {
    day.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()
}

/// Laura manages Peter and Bob; Peter is off Monday and Tuesday.
async fn seeded() -> (TestContext, [pto::database::models::User; 3], NaiveDate) {
    common::setup_test_env();
    let ctx = TestContext::new().await.unwrap();
    let laura = ctx.user("laura", "Laura", "Thomson", None).await;
    let peter = ctx
        .user("peter", "Peter", "Bengtsson", Some("laura@mozilla.com"))
        .await;
    let bob = ctx
        .user("bob", "Bob", "Builder", Some("laura@mozilla.com"))
        .await;

    let monday = future_monday();
    ctx.logged_entry(&peter, monday, monday + Days::new(1), "Skiing", 8)
        .await;
    (ctx, [laura, peter, bob], monday)
}

#[actix_web::test]
async fn test_calendar_events_for_manager() {
    let (ctx, [laura, ..], monday) = seeded().await;
    let app = test_app!(ctx);

    let uri = format!(
        "/dates/calendar/events?start={}&end={}",
        epoch_seconds(monday - Days::new(1)),
        epoch_seconds(monday + Days::new(7)) * 1000
    );
    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(ctx.bearer(&laura))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = test::read_body_json(res).await;
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "Peter Bengtsson - 2 days, Skiing");
    assert_eq!(events[0]["mine"], false);
    assert_eq!(events[0]["color"], COLORS[0]);
    assert_eq!(
        body["colors"],
        json!([{ "name": "Peter Bengtsson", "color": COLORS[0] }])
    );
}

#[actix_web::test]
async fn test_calendar_events_hide_details_from_teammates() {
    let (ctx, [_, _, bob], monday) = seeded().await;
    let app = test_app!(ctx);

    let uri = format!(
        "/dates/calendar/events?start={}&end={}",
        epoch_seconds(monday),
        epoch_seconds(monday + Days::new(7))
    );
    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(ctx.bearer(&bob))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["events"][0]["title"], "Peter Bengtsson - 2 days");
}

#[actix_web::test]
async fn test_calendar_events_requires_window() {
    let (ctx, [laura, ..], _) = seeded().await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/dates/calendar/events?start=1285041600")
        .insert_header(ctx.bearer(&laura))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/dates/calendar/events?start=junk&end=1285041600")
        .insert_header(ctx.bearer(&laura))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

async fn feed_path(ctx: &TestContext, user: &pto::database::models::User) -> String {
    let key = ctx.state.user_keys.get_or_create(user.id).await.unwrap();
    format!("/dates/{}/ptocalendar.ics", key.key)
}

#[actix_web::test]
async fn test_ics_feed_for_manager() {
    let (ctx, [laura, ..], monday) = seeded().await;
    let app = test_app!(ctx);
    let path = feed_path(&ctx, &laura).await;

    let req = test::TestRequest::get()
        .uri("/dates/calendar/url")
        .insert_header(ctx.bearer(&laura))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["data"]["url"].as_str().unwrap().ends_with(&path));

    let req = test::TestRequest::get().uri(&path).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/calendar;charset=utf-8"
    );
    let disposition = res
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("inline; filename="));

    let body = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
    assert!(body.contains("X-WR-CALNAME:Test Vacation"));
    assert!(body.contains("SUMMARY:Peter Bengtsson - 2 days Vacation"));
    assert!(body.contains("DESCRIPTION:Skiing"));
    assert!(body.contains(&format!(
        "DTSTART;VALUE=DATE:{}",
        monday.format("%Y%m%d")
    )));
}

#[actix_web::test]
async fn test_ics_feed_hides_details_from_teammates() {
    let (ctx, [_, _, bob], _) = seeded().await;
    let app = test_app!(ctx);
    let path = feed_path(&ctx, &bob).await;

    let req = test::TestRequest::get().uri(&path).to_request();
    let body = String::from_utf8(test::call_and_read_body(&app, req).await.to_vec()).unwrap();
    assert!(body.contains(&format!("DESCRIPTION:{}", HIDDEN_DETAILS)));
    assert!(!body.contains("Skiing"));
}

#[actix_web::test]
async fn test_reset_calendar_url_expires_feed() {
    let (ctx, [laura, ..], _) = seeded().await;
    let app = test_app!(ctx);
    let path = feed_path(&ctx, &laura).await;

    let req = test::TestRequest::post()
        .uri("/dates/calendar/url/reset")
        .insert_header(ctx.bearer(&laura))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri(&path).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
    assert!(body.contains("SUMMARY:Calendar expired"));
    assert!(!body.contains("Peter Bengtsson"));

    assert_ne!(feed_path(&ctx, &laura).await, path);
}
