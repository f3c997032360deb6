mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{envelope, TestApp, API_KEY, ORDER_ID};

#[tokio::test]
async fn payment_methods_follow_merchant_sort_order() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/payment-methods?total=60&currency_id=3&currency_code=EUR&country_id=150",
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|method| method["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["multisafepay/bankTransfer", "multisafepay/ideal"]);
}

#[tokio::test]
async fn payment_methods_are_empty_for_zero_totals() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/payment-methods?total=0&currency_code=EUR", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn ideal_checkout_lists_issuers_from_the_vendor() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/test/issuers/IDEAL"))
        .and(header("api_key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
            { "code": "0031", "description": "ABN AMRO" },
            { "code": "0761", "description": "ASN Bank" },
        ]))))
        .expect(1)
        .mount(&app.vendor)
        .await;

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/checkout/ideal?order_id={}", ORDER_ID), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let view = &body["data"];
    assert_eq!(view["gateway"], "IDEAL");
    assert_eq!(view["type"], "direct");
    assert_eq!(view["test_mode"], true);
    assert_eq!(view["issuers"][0]["code"], "0031");
}

#[tokio::test]
async fn ideal_checkout_falls_back_to_redirect_when_issuers_fail() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/test/issuers/IDEAL"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "error_code": 500,
            "error_info": "unavailable",
        })))
        .mount(&app.vendor)
        .await;

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/checkout/ideal?order_id={}", ORDER_ID), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["type"], "redirect");
    assert_eq!(body["data"]["issuers"], json!([]));
}

#[tokio::test]
async fn unknown_gateway_is_not_found() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/checkout/nope?order_id={}", ORDER_ID), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validate_reports_missing_direct_fields() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/checkout/validate",
            Some(json!({ "gender": "", "birthday": "1980-01-01" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["error"]["gender"].is_string());
    assert!(body["error"].get("birthday").is_none());
}

#[tokio::test]
async fn validate_accepts_complete_form() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/checkout/validate",
            Some(json!({ "gender": "male", "birthday": "1980-01-01" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn confirm_creates_vendor_order_and_returns_payment_link() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/test/orders"))
        .and(header("api_key", API_KEY))
        .and(body_partial_json(json!({
            "type": "redirect",
            "order_id": "1045",
            "gateway": "BANKTRANS",
            "currency": "EUR",
            "amount": 6000,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "order_id": "1045",
            "payment_url": "https://payv2.multisafepay.com/connect/abc",
        }))))
        .expect(1)
        .mount(&app.vendor)
        .await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/checkout/confirm",
            Some(json!({ "order_id": ORDER_ID, "type": "redirect", "gateway": "BANKTRANS" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["redirect"],
        "https://payv2.multisafepay.com/connect/abc"
    );
}

#[tokio::test]
async fn confirm_hides_vendor_error_details() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/test/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error_code": 1032,
            "error_info": "Invalid API key",
        })))
        .mount(&app.vendor)
        .await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/checkout/confirm",
            Some(json!({ "order_id": ORDER_ID, "type": "redirect", "gateway": "BANKTRANS" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let message = body["message"].as_str().unwrap();
    assert!(!message.contains("1032"));
    assert!(message.contains("problem processing your payment"));
}

#[tokio::test]
async fn confirm_for_unknown_order_is_not_found() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/checkout/confirm",
            Some(json!({ "order_id": 9999, "gateway": "BANKTRANS" })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn layout_assets_are_injected_on_checkout_pages() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/checkout/assets?route=checkout/checkout&position=header",
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_object());
}
