mod common;

use axum::http::StatusCode;
use common::{amount, dec, TestApp};
use serde_json::json;
use voucher_service::models::{NewQuotation, Quotation, QuotationKind};

#[tokio::test]
async fn allocation_updates_voucher_and_quotation() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Periyar Resorts", "10000").await;
    let quotation_id = app.create_quotation("hotel", "Periyar Resorts", "25000").await;

    let (status, body) = app.allocate(&voucher_id, "hotel", &quotation_id, "4000.50").await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(dec(&body["voucher_available"]), amount("5999.50"));
    assert_eq!(dec(&body["quotation_total_paid"]), amount("4000.50"));
    assert_eq!(body["allocation"]["created_by"], common::TEST_USER_ID);

    let (_, voucher) = app.get(&format!("/vouchers/{}", voucher_id)).await;
    assert_eq!(dec(&voucher["allocated_amount"]), amount("4000.50"));
    assert_eq!(dec(&voucher["available_balance"]), amount("5999.50"));

    let (_, quotation) = app.get(&format!("/quotations/hotel/{}", quotation_id)).await;
    assert_eq!(dec(&quotation["total_paid"]), amount("4000.50"));
    assert_eq!(quotation["payment_status"], "partial");
}

#[tokio::test]
async fn allocating_more_than_remaining_balance_is_rejected() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Alleppey Cruises", "1000").await;
    let first = app.create_quotation("custom", "Guest A", "800").await;
    let second = app.create_quotation("custom", "Guest B", "800").await;

    let (status, _) = app.allocate(&voucher_id, "custom", &first, "700").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.allocate(&voucher_id, "custom", &second, "300.01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("exceeds"));

    // Exactly the remainder is still fine.
    let (status, body) = app.allocate(&voucher_id, "custom", &second, "300").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(dec(&body["voucher_available"]), amount("0"));
}

#[tokio::test]
async fn linking_the_same_pair_twice_conflicts() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Coorg Stays", "5000").await;
    let quotation_id = app.create_quotation("vehicle", "Coorg Stays", "3000").await;

    let (status, _) = app.allocate(&voucher_id, "vehicle", &quotation_id, "1000").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.allocate(&voucher_id, "vehicle", &quotation_id, "500").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn missing_voucher_or_quotation_is_not_found() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Ooty Escapes", "5000").await;
    let quotation_id = app.create_quotation("flight", "Ooty Escapes", "3000").await;

    let (status, _) = app.allocate("no-such-voucher", "flight", &quotation_id, "10").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.allocate(&voucher_id, "flight", "FQ-0000-0000", "10").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Right id, wrong variant.
    let (status, _) = app.allocate(&voucher_id, "hotel", &quotation_id, "10").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_positive_amount_fails_validation() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Wayanad Trails", "5000").await;
    let quotation_id = app.create_quotation("quick", "Wayanad Trails", "3000").await;

    let (status, _) = app.allocate(&voucher_id, "quick", &quotation_id, "0").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = app.allocate(&voucher_id, "quick", &quotation_id, "-5").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn amounts_above_the_cap_fail_validation() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post(
            "/vouchers",
            json!({
                "voucher_type": "receive",
                "party": "Munnar Estates",
                "amount": "79228162514264337593543950335",
                "date": "2026-10-01"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);

    let voucher_id = app.create_voucher("Munnar Estates", "5000").await;
    let quotation_id = app.create_quotation("quick", "Munnar Estates", "3000").await;
    let (status, _) = app
        .allocate(&voucher_id, "quick", &quotation_id, "1000000000000.01")
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unlinking_restores_voucher_balance() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Kovalam Beach Co", "2000").await;
    let quotation_id = app.create_quotation("full", "Kovalam Beach Co", "5000").await;

    let (_, body) = app.allocate(&voucher_id, "full", &quotation_id, "1250").await;
    let link_id = body["allocation"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.delete(&format!("/allocations/{}", link_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&body["voucher_available"]), amount("2000"));
    assert_eq!(dec(&body["quotation_total_paid"]), amount("0"));

    let (_, quotation) = app.get(&format!("/quotations/full/{}", quotation_id)).await;
    assert_eq!(quotation["payment_status"], "unpaid");

    let (status, _) = app.delete(&format!("/allocations/{}", link_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn updating_a_link_checks_balance_excluding_itself() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Munnar Heights", "1000").await;
    let first = app.create_quotation("hotel", "Guest A", "2000").await;
    let second = app.create_quotation("hotel", "Guest B", "2000").await;

    let (_, body) = app.allocate(&voucher_id, "hotel", &first, "600").await;
    let link_id = body["allocation"]["id"].as_str().unwrap().to_string();
    app.allocate(&voucher_id, "hotel", &second, "300").await;

    // 600 -> 700 fits: 1000 - 300 leaves 700 for this link.
    let (status, body) = app
        .patch(&format!("/allocations/{}", link_id), json!({ "amount": "700" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(dec(&body["voucher_available"]), amount("0"));
    assert_eq!(dec(&body["quotation_total_paid"]), amount("700"));

    let (status, _) = app
        .patch(&format!("/allocations/{}", link_id), json!({ "amount": "700.01" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quotation_payments_list_every_link_with_its_voucher() {
    let app = TestApp::spawn();
    let advance = app.create_voucher("Thekkady Tours", "3000").await;
    let balance = app.create_voucher("Thekkady Tours", "4000").await;
    let quotation_id = app.create_quotation("hotel", "Thekkady Tours", "6000").await;

    app.allocate(&advance, "hotel", &quotation_id, "3000").await;
    app.allocate(&balance, "hotel", &quotation_id, "3500").await;

    let (status, body) = app
        .get(&format!("/quotations/hotel/{}/payments", quotation_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&body["total_paid"]), amount("6500"));
    assert_eq!(dec(&body["balance_due"]), amount("0"));
    assert_eq!(body["payment_status"], "overpaid");

    let payments = body["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 2);
    let total: rust_decimal::Decimal = payments
        .iter()
        .map(|p| dec(&p["allocated_amount"]))
        .sum();
    assert_eq!(total, dec(&body["total_paid"]));
    assert!(payments
        .iter()
        .all(|p| p["voucher_no"].as_str().unwrap().starts_with("RV-")));
    assert!(payments.iter().all(|p| p["party"] == "Thekkady Tours"));
}

#[tokio::test]
async fn recompute_rebuilds_total_from_links() {
    let app = TestApp::spawn();
    let mut quotation = Quotation::new(
        QuotationKind::Quick,
        NewQuotation {
            client_name: "Kumarakom Lake".to_string(),
            total_amount: amount("9000"),
            details: None,
        },
        None,
    );
    quotation.quotation_id = "QQ-2610-0500".to_string();
    quotation.total_paid = amount("999");
    app.store.insert_quotation(&quotation).await.unwrap();

    let uri = "/quotations/quick/QQ-2610-0500/payments/recompute";
    let (status, body) = app.post(uri, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(dec(&body["total_paid"]), amount("0"));
    assert_eq!(body["payment_status"], "unpaid");

    let voucher_id = app.create_voucher("Kumarakom Lake", "9000").await;
    app.allocate(&voucher_id, "quick", "QQ-2610-0500", "300").await;

    let (status, body) = app.post(uri, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&body["total_paid"]), amount("300"));
    assert_eq!(body["payment_status"], "partial");

    let (status, _) = app
        .post("/quotations/quick/QQ-0000-0000/payments/recompute", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn voucher_allocations_lists_links_and_balance() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Varkala Cliff", "5000").await;
    let hotel = app.create_quotation("hotel", "Varkala Cliff", "2000").await;
    let vehicle = app.create_quotation("vehicle", "Varkala Cliff", "1000").await;

    app.allocate(&voucher_id, "hotel", &hotel, "2000").await;
    app.allocate(&voucher_id, "vehicle", &vehicle, "1000").await;

    let (status, body) = app
        .get(&format!("/vouchers/{}/allocations", voucher_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allocations"].as_array().unwrap().len(), 2);
    assert_eq!(dec(&body["voucher"]["available_balance"]), amount("2000"));
}

#[tokio::test]
async fn available_vouchers_exclude_exhausted_and_already_linked() {
    let app = TestApp::spawn();
    let exhausted = app.create_voucher("Bekal Fort Travels", "1000").await;
    let linked = app.create_voucher("Bekal Fort Travels", "1000").await;
    let free = app.create_voucher("Bekal Fort Travels", "1000").await;
    let other_party = app.create_voucher("Someone Else", "1000").await;

    let target = app.create_quotation("hotel", "Bekal Fort Travels", "5000").await;
    let elsewhere = app.create_quotation("hotel", "Bekal Fort Travels", "5000").await;
    app.allocate(&exhausted, "hotel", &elsewhere, "1000").await;
    app.allocate(&linked, "hotel", &target, "400").await;

    let (status, body) = app
        .get(&format!(
            "/available-vouchers?party=bekal&quotation_type=hotel&quotation_id={}",
            target
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![free.as_str()]);

    let (_, body) = app.get("/available-vouchers?voucher_type=receive").await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&linked.as_str()));
    assert!(ids.contains(&other_party.as_str()));
    assert!(!ids.contains(&exhausted.as_str()));

    let (status, _) = app.get("/available-vouchers?quotation_type=hotel").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocations_cannot_overdraw_a_voucher() {
    let app = TestApp::spawn();
    let voucher_id = app.create_voucher("Group Tour Desk", "1000").await;
    let mut quotations = Vec::new();
    for n in 0..8 {
        quotations.push(
            app.create_quotation("quick", &format!("Traveller {}", n), "250")
                .await,
        );
    }

    let tasks = quotations.into_iter().map(|quotation_id| {
        let router = app.router.clone();
        let store = app.store.clone();
        let voucher_id = voucher_id.clone();
        tokio::spawn(async move {
            let app = TestApp { router, store };
            app.allocate(&voucher_id, "quick", &quotation_id, "250").await.0
        })
    });

    let mut created = 0;
    for task in tasks.collect::<Vec<_>>() {
        if task.await.unwrap() == StatusCode::CREATED {
            created += 1;
        }
    }
    assert_eq!(created, 4);

    let (_, voucher) = app.get(&format!("/vouchers/{}", voucher_id)).await;
    assert_eq!(dec(&voucher["allocated_amount"]), amount("1000"));
    assert_eq!(dec(&voucher["available_balance"]), amount("0"));
}
