use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use care_hub_data::models::doctor::NewDoctor;
use care_hub_data::repository::DoctorRepositoryTrait;
use care_hub_domain::testing::MockHealthService;

use crate::api::routes::create_app;
use crate::api::state::testing::TestContext;

const PHONE: &str = "13812345678";

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn seed_doctor(ctx: &TestContext, name: &str, department: &str) -> Uuid {
    ctx.doctors
        .create(NewDoctor {
            name: name.to_string(),
            title: "主任医师".to_string(),
            department: department.to_string(),
            hospital: "协和医院".to_string(),
            specialties: "高血压,糖尿病".to_string(),
            bio: String::new(),
            avatar_url: Some("avatars/1.png".to_string()),
            consultation_fee_cents: 10000,
            rating: 4.8,
        })
        .await
        .unwrap()
        .id
}

async fn login(ctx: &TestContext, app: &Router) -> String {
    let (status, _) = send(app, "POST", "/api/auth/sms/send", None, Some(json!({ "phone": PHONE }))).await;
    assert_eq!(status, StatusCode::OK);

    let code = ctx.sms.last_code_for(PHONE).expect("code sent");
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/sms/login",
        None,
        Some(json!({ "phone": PHONE, "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

fn admin_token(ctx: &TestContext) -> String {
    ctx.state
        .tokens
        .issue_pair(Uuid::new_v4(), &["admin".to_string()])
        .unwrap()
        .access_token
}

#[tokio::test]
async fn test_sms_login_then_me() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());

    let token = login(&ctx, &app).await;
    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "138****5678");
    assert_eq!(body["roles"], json!(["user"]));
}

#[tokio::test]
async fn test_wrong_code_is_rejected() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());

    send(&app, "POST", "/api/auth/sms/send", None, Some(json!({ "phone": PHONE }))).await;
    let code = ctx.sms.last_code_for(PHONE).unwrap();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/sms/login",
        None,
        Some(json!({ "phone": PHONE, "code": wrong })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_resend_within_cooldown_is_429() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());

    send(&app, "POST", "/api/auth/sms/send", None, Some(json!({ "phone": PHONE }))).await;
    let (status, _) = send(&app, "POST", "/api/auth/sms/send", None, Some(json!({ "phone": PHONE }))).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(ctx.sms.sent().len(), 1);
}

#[tokio::test]
async fn test_wechat_login() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/wechat/login",
        None,
        Some(json!({ "code": "wx-code-1", "nickname": "小王" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new_user"], true);
    assert_eq!(body["user"]["wechat_bound"], true);

    let (status, _) = send(&app, "POST", "/api/auth/wechat/login", None, Some(json!({ "code": "bogus" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());

    let (status, _) = send(&app, "GET", "/api/appointments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/membership/cards", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_doctor_listing_pagination_links() {
    let ctx = TestContext::new();
    for name in ["张医生", "李医生", "王医生"] {
        seed_doctor(&ctx, name, "心内科").await;
    }
    let app = create_app(ctx.state.clone());

    let (status, body) = send(&app, "GET", "/api/doctors?limit=2&offset=0", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["next"], "/api/doctors?limit=2&offset=2");
    assert!(body.get("previous").map_or(true, Value::is_null));
    assert_eq!(body["data"][0]["avatar_url"], "https://cdn.example.com/avatars/1.png");
}

#[tokio::test]
async fn test_unknown_doctor_is_404() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());

    let (status, body) = send(&app, "GET", &format!("/api/doctors/{}", Uuid::new_v4()), None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_book_and_list_appointments() {
    let ctx = TestContext::new();
    let doctor_id = seed_doctor(&ctx, "张医生", "心内科").await;
    let app = create_app(ctx.state.clone());
    let token = login(&ctx, &app).await;

    let booking = json!({
        "doctor_id": doctor_id,
        "scheduled_at": (Utc::now() + Duration::days(2)).to_rfc3339(),
        "patient_name": "王五",
        "patient_phone": PHONE,
    });
    let (status, booked) = send(&app, "POST", "/api/appointments", Some(&token), Some(booking.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booked["status"], "pending");
    assert_eq!(booked["price_cents"], 10000);

    let (status, _) = send(&app, "POST", "/api/appointments", Some(&token), Some(booking)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, list) = send(&app, "GET", "/api/appointments", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total_count"], 1);

    let cancel = format!("/api/appointments/{}/cancel", booked["id"].as_str().unwrap());
    let (status, cancelled) = send(&app, "POST", &cancel, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
}

#[tokio::test]
async fn test_consultation_anonymous_and_signed_in() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());
    let payload = json!({ "name": "赵六", "phone": PHONE, "message": "想咨询会员权益" });

    let (status, anonymous) = send(&app, "POST", "/api/consultations", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(anonymous["user_id"].is_null());
    assert_eq!(anonymous["category"], "general");

    let token = login(&ctx, &app).await;
    let (status, mine) = send(&app, "POST", "/api/consultations", Some(&token), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(mine["user_id"].is_string());

    let (status, list) = send(&app, "GET", "/api/consultations/mine", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total_count"], 1);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());
    let user_token = login(&ctx, &app).await;

    let (status, _) = send(&app, "GET", "/api/admin/appointments", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", "/api/admin/appointments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = admin_token(&ctx);
    let (status, body) = send(&app, "GET", "/api/admin/appointments", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn test_admin_creates_doctor_and_replies_to_consultation() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());
    let admin = admin_token(&ctx);

    let (status, doctor) = send(
        &app,
        "POST",
        "/api/admin/doctors",
        Some(&admin),
        Some(json!({
            "name": "孙医生",
            "title": "副主任医师",
            "department": "内分泌科",
            "hospital": "人民医院",
            "specialties": ["糖尿病", "甲状腺"],
            "consultation_fee_cents": 5000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(doctor["specialties"], json!(["糖尿病", "甲状腺"]));

    let (_, consultation) = send(
        &app,
        "POST",
        "/api/consultations",
        None,
        Some(json!({ "name": "赵六", "phone": PHONE, "category": "medical", "message": "血糖偏高" })),
    )
    .await;
    let reply_uri = format!("/api/admin/consultations/{}/reply", consultation["id"].as_str().unwrap());
    let (status, replied) = send(&app, "POST", &reply_uri, Some(&admin), Some(json!({ "reply": "请预约门诊" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(replied["status"], "replied");
    assert_eq!(replied["reply"], "请预约门诊");
}

#[tokio::test]
async fn test_membership_purchase_grants_discount() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());
    let token = login(&ctx, &app).await;

    let (status, order) = send(
        &app,
        "POST",
        "/api/membership/orders",
        Some(&token),
        Some(json!({ "plan_code": "quarterly" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");

    let confirm = format!("/api/membership/orders/{}/confirm", order["id"].as_str().unwrap());
    let (status, paid) = send(&app, "POST", &confirm, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["order"]["status"], "paid");

    let (status, _) = send(&app, "POST", &confirm, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, cards) = send(&app, "GET", "/api/membership/cards", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cards["current_discount_percent"], 15);
    assert_eq!(cards["cards"][0]["is_active"], true);
}

#[tokio::test]
async fn test_unknown_plan_is_404() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());
    let token = login(&ctx, &app).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/membership/orders",
        Some(&token),
        Some(json!({ "plan_code": "lifetime" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logout_revokes_access_token() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());
    let token = login(&ctx, &app).await;

    let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotates_refresh_token() {
    let ctx = TestContext::new();
    let app = create_app(ctx.state.clone());

    send(&app, "POST", "/api/auth/sms/send", None, Some(json!({ "phone": PHONE }))).await;
    let code = ctx.sms.last_code_for(PHONE).unwrap();
    let (_, login) = send(
        &app,
        "POST",
        "/api/auth/sms/login",
        None,
        Some(json!({ "phone": PHONE, "code": code })),
    )
    .await;
    let refresh = login["refresh_token"].as_str().unwrap().to_string();

    let (status, rotated) = send(&app, "POST", "/api/auth/refresh", None, Some(json!({ "refresh_token": refresh }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(rotated["access_token"].is_string());

    let (status, _) = send(&app, "POST", "/api/auth/refresh", None, Some(json!({ "refresh_token": refresh }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_reports_degraded_database() {
    let ctx = TestContext::with_health(Arc::new(MockHealthService::new().with_degraded_database()));
    let app = create_app(ctx.state.clone());

    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
}
