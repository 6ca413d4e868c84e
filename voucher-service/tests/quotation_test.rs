mod common;

use axum::http::StatusCode;
use common::{amount, dec, TestApp};
use serde_json::json;

#[tokio::test]
async fn each_variant_gets_its_own_prefix() {
    let app = TestApp::spawn();
    let expected = [
        ("hotel", "HQ-"),
        ("vehicle", "VQ-"),
        ("flight", "FQ-"),
        ("custom", "CQ-"),
        ("full", "FP-"),
        ("quick", "QQ-"),
    ];

    for (kind, prefix) in expected {
        let id = app.create_quotation(kind, "Trivandrum Travels", "1000").await;
        assert!(id.starts_with(prefix), "{} should start with {}", id, prefix);
        assert!(id.ends_with("-0001"), "{} should be the first of its month", id);
    }
}

#[tokio::test]
async fn unknown_variant_is_a_bad_request() {
    let app = TestApp::spawn();
    let (status, _) = app
        .post(
            "/quotations/cruise",
            json!({ "client_name": "A", "total_amount": "10" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quotation_round_trips_details() {
    let app = TestApp::spawn();
    let (status, created) = app
        .post(
            "/quotations/flight",
            json!({
                "client_name": "Anand K",
                "total_amount": "42999.00",
                "details": { "sector": "COK-DEL", "passengers": 2 }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["payment_status"], "unpaid");
    assert_eq!(created["created_by"], common::TEST_USER_ID);

    let id = created["quotation_id"].as_str().unwrap();
    let (status, fetched) = app.get(&format!("/quotations/flight/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["details"]["sector"], "COK-DEL");
    assert_eq!(dec(&fetched["total_amount"]), amount("42999"));
    assert_eq!(dec(&fetched["balance_due"]), amount("42999"));

    // Same id under another variant does not exist.
    let (status, _) = app.get(&format!("/quotations/hotel/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_changes_status_without_touching_paid_total() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Idukki Retreats", "5000").await;
    let quotation_id = app.create_quotation("custom", "Idukki Retreats", "5000").await;
    app.allocate(&voucher_id, "custom", &quotation_id, "4000").await;

    let (status, body) = app
        .patch(
            &format!("/quotations/custom/{}", quotation_id),
            json!({ "total_amount": "3500" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&body["total_paid"]), amount("4000"));
    assert_eq!(body["payment_status"], "overpaid");
    assert_eq!(dec(&body["balance_due"]), amount("0"));

    let (status, _) = app
        .patch(
            &format!("/quotations/custom/{}", quotation_id),
            json!({ "total_amount": "-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn list_quotations_is_per_variant() {
    let app = TestApp::spawn();
    for n in 0..3 {
        app.create_quotation("vehicle", &format!("Client {}", n), "100").await;
    }
    app.create_quotation("hotel", "Client H", "100").await;

    let (status, body) = app.get("/quotations/vehicle?page_size=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);
    let quotations = body["quotations"].as_array().unwrap();
    assert_eq!(quotations.len(), 2);
    assert_eq!(quotations[0]["client_name"], "Client 2");
    assert!(quotations.iter().all(|q| q["quotation_type"] == "vehicle"));
}
