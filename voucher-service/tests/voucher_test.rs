mod common;

use axum::http::StatusCode;
use common::{amount, dec, TestApp};
use serde_json::json;

#[tokio::test]
async fn create_voucher_assigns_sequential_numbers() {
    let app = TestApp::spawn();

    let (status, first) = app
        .post(
            "/vouchers",
            json!({
                "voucher_type": "receive",
                "party": "Malabar Holidays",
                "amount": "15000.00",
                "date": "2026-10-02",
                "payment_mode": "upi",
                "reference": "UTR12345"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["voucher_no"], "RV-000001");
    assert_eq!(first["created_by"], common::TEST_USER_ID);
    assert_eq!(dec(&first["available_balance"]), amount("15000"));

    let (_, second) = app
        .post(
            "/vouchers",
            json!({
                "voucher_type": "payment",
                "party": "Hotel Sea Pearl",
                "amount": 8000,
                "date": "2026-10-03"
            }),
        )
        .await;
    assert_eq!(second["voucher_no"], "PV-000001");
    assert_eq!(dec(&second["amount"]), amount("8000"));
}

#[tokio::test]
async fn invalid_voucher_is_rejected() {
    let app = TestApp::spawn();

    let (status, body) = app
        .post(
            "/vouchers",
            json!({
                "voucher_type": "receive",
                "party": "",
                "amount": "0",
                "date": "2026-10-02"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn get_unknown_voucher_is_not_found() {
    let app = TestApp::spawn();
    let (status, _) = app.get("/vouchers/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_vouchers_filters_and_paginates() {
    let app = TestApp::spawn();
    for n in 0..5 {
        app.create_voucher(&format!("Kochi Agency {}", n), "100").await;
    }
    app.post(
        "/vouchers",
        json!({
            "voucher_type": "payment",
            "party": "Kochi Agency supplier",
            "amount": "50",
            "date": "2026-10-04"
        }),
    )
    .await;

    let (status, body) = app
        .get("/vouchers?voucher_type=receive&page=2&page_size=2")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 5);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["page"], 2);
    assert_eq!(body["vouchers"].as_array().unwrap().len(), 2);

    // Newest first
    let (_, body) = app.get("/vouchers?party=KOCHI&page_size=1").await;
    assert_eq!(body["total"], 6);
    assert_eq!(body["vouchers"][0]["voucher_no"], "PV-000001");
}

#[tokio::test]
async fn page_beyond_the_end_is_empty() {
    let app = TestApp::spawn();
    app.create_voucher("Kovalam Beach Stays", "100").await;

    let (status, body) = app
        .get("/vouchers?page=18446744073709551615&page_size=100")
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["total"], 1);
    assert!(body["vouchers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn correction_cannot_drop_amount_below_allocated() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Kannur Homestays", "5000").await;
    let quotation_id = app.create_quotation("hotel", "Kannur Homestays", "5000").await;
    app.allocate(&voucher_id, "hotel", &quotation_id, "3000").await;

    let (status, _) = app
        .patch(&format!("/vouchers/{}", voucher_id), json!({ "amount": "2999.99" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .patch(
            &format!("/vouchers/{}", voucher_id),
            json!({ "amount": "3000", "reference": "corrected UTR" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&body["available_balance"]), amount("0"));
    assert_eq!(body["reference"], "corrected UTR");
    assert_eq!(body["party"], "Kannur Homestays");
}

#[tokio::test]
async fn voucher_with_links_cannot_be_deleted() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Kasaragod Trips", "500").await;
    let quotation_id = app.create_quotation("quick", "Kasaragod Trips", "500").await;
    let (_, body) = app.allocate(&voucher_id, "quick", &quotation_id, "500").await;
    let link_id = body["allocation"]["id"].as_str().unwrap().to_string();

    let (status, _) = app.delete(&format!("/vouchers/{}", voucher_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.delete(&format!("/allocations/{}", link_id)).await;
    let (status, _) = app.delete(&format!("/vouchers/{}", voucher_id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/vouchers/{}", voucher_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
