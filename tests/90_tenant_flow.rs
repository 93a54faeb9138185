mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

// End-to-end flow against a real database: signup, verify, then work
// inside the tenant. Skipped (early return) when no database is behind
// the spawned server.

fn unique_slug(prefix: &str) -> String {
    format!("{}-{}", prefix, std::process::id())
}

fn signup_body(slug: &str, business_name: &str) -> Value {
    json!({
        "email": format!("{}@example.co.uk", slug),
        "businessName": business_name,
        "tradeType": "car_mechanic",
        "slug": slug,
    })
}

#[tokio::test]
async fn signup_verify_and_work_in_the_tenant() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_available(server).await {
        eprintln!("skipping: no database available");
        return Ok(());
    }

    let slug = unique_slug("garage");
    let email = format!("{}@example.co.uk", slug);

    // Cookie store so the session cookie from verify is replayed.
    let client = reqwest::Client::builder().cookie_store(true).build()?;

    // Signup provisions the tenant and (in development) echoes the
    // verification token.
    let res = client
        .post(format!("{}/api/auth/signup", server.base_url))
        .json(&json!({
            "email": email,
            "businessName": "Flow Test Garage",
            "tradeType": "car_mechanic",
            "slug": slug,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["tenant"]["slug"], slug.as_str());
    let token = body["data"]["verification_token"]
        .as_str()
        .expect("development server echoes the verification token")
        .to_string();

    // A second signup with the same slug conflicts.
    let res = client
        .post(format!("{}/api/auth/signup", server.base_url))
        .json(&json!({
            "email": format!("other-{}", email),
            "businessName": "Shadow Garage",
            "slug": slug,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Verify consumes the token and sets the session cookie.
    let res = client
        .post(format!("{}/api/auth/verify", server.base_url))
        .json(&json!({ "token": token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // The same token is single-use.
    let res = client
        .post(format!("{}/api/auth/verify", server.base_url))
        .json(&json!({ "token": token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Session reflects the tenant.
    let res = client
        .get(format!("{}/api/auth/session", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["tenant_slug"], slug.as_str());

    let api = format!("{}/t/{}/api", server.base_url, slug);

    // Car mechanics are seeded with the "Parts" label and vehicle fields.
    let res = client.get(format!("{}/settings", api)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["settings"]["line_item_label"], "Parts");
    assert_eq!(body["data"]["settings"]["show_vehicle_fields"], true);

    // Create a booking; phone/reg/postcode are normalized.
    let booking = json!({
        "booked_by": "Dave",
        "booking_date": "2030-06-02",
        "booking_time": "09:30",
        "service_type": "MOT",
        "customer_name": "Sam Jones",
        "customer_phone": "07700 900 123",
        "vehicle_make": "Ford",
        "vehicle_model": "Focus",
        "vehicle_reg": "ab12 cde",
        "location_address": "1 High Street",
        "location_postcode": "sw1a 1aa",
        "issue_description": "Annual MOT"
    });
    let res = client
        .post(format!("{}/bookings", api))
        .json(&booking)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["customer_phone"], "07700900123");
    assert_eq!(body["data"]["vehicle_reg"], "AB12 CDE");
    assert_eq!(body["data"]["location_postcode"], "SW1A 1AA");
    assert_eq!(body["data"]["status"], "confirmed");
    let booking_id = body["data"]["id"].as_i64().unwrap();

    // Same slot again is a conflict.
    let res = client
        .post(format!("{}/bookings", api))
        .json(&booking)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Per-document routes must resolve on the /t/:tenant mount, where
    // the slug adds a second path capture.
    let res = client
        .get(format!("{}/bookings/{}", api, booking_id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["id"].as_i64(), Some(booking_id));

    // Complete it.
    let res = client
        .post(format!("{}/bookings/{}/complete", api, booking_id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["status"], "completed");

    // Estimate with line items and VAT.
    let res = client
        .post(format!("{}/estimates", api))
        .json(&json!({
            "client_name": "Sam Jones",
            "vat_rate": "20",
            "line_items": [
                { "description": "Labour", "quantity": "2", "rate": "60" },
                { "description": "Brake pads", "quantity": "1", "rate": "80" }
            ]
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    let estimate = &body["data"];
    assert_eq!(estimate["estimate_number"], "EST0001");
    assert_eq!(estimate["subtotal"], "200.00");
    assert_eq!(estimate["vat_amount"], "40.00");
    assert_eq!(estimate["total"], "240.00");
    assert_eq!(estimate["line_items"].as_array().unwrap().len(), 2);
    let estimate_id = estimate["id"].as_i64().unwrap();

    // Share it and fetch the public view without credentials.
    let res = client
        .post(format!("{}/estimates/{}/share", api, estimate_id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    let share_token = body["data"]["share_token"].as_str().unwrap().to_string();

    let anon = reqwest::Client::new();
    let res = anon
        .get(format!("{}/share/estimate/{}", server.base_url, share_token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["estimate"]["id"], estimate_id);
    assert_eq!(body["data"]["business"]["business_name"], "Flow Test Garage");

    // Invoice lifecycle: create, mark paid.
    let res = client
        .post(format!("{}/invoices", api))
        .json(&json!({
            "client_name": "Sam Jones",
            "line_items": [{ "description": "Labour", "quantity": "1", "rate": "100" }]
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["invoice_number"], "INV0001");
    let invoice_id = body["data"]["id"].as_i64().unwrap();

    let res = client
        .post(format!("{}/invoices/{}/mark-paid", api, invoice_id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["status"], "paid");
    assert_eq!(body["data"]["balance_due"], "0");

    // A session bound to this tenant cannot reach another slug.
    let res = client
        .get(format!("{}/t/someone-else/api/bookings", server.base_url))
        .send()
        .await?;
    assert!(
        res.status() == StatusCode::FORBIDDEN || res.status() == StatusCode::NOT_FOUND,
        "unexpected status: {}",
        res.status()
    );

    Ok(())
}

// The staff token skips the session-tenant binding, so isolation there
// rests entirely on the per-tenant schema. Records created in one
// tenant must be invisible when the staff token addresses another.
#[tokio::test]
async fn staff_token_stays_inside_the_addressed_tenant() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_available(server).await {
        eprintln!("skipping: no database available");
        return Ok(());
    }

    let client = reqwest::Client::new();
    let slug_a = unique_slug("depot-a");
    let slug_b = unique_slug("depot-b");

    for slug in [&slug_a, &slug_b] {
        let res = client
            .post(format!("{}/api/auth/signup", server.base_url))
            .json(&signup_body(slug, "Depot"))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .post(format!("{}/t/{}/api/estimates", server.base_url, slug_a))
        .bearer_auth(common::STAFF_TOKEN)
        .json(&json!({ "client_name": "Only In A" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    let estimate_id = body["data"]["id"].as_i64().unwrap();

    // Listing through the other tenant's slug sees nothing.
    let res = client
        .get(format!("{}/t/{}/api/estimates", server.base_url, slug_b))
        .bearer_auth(common::STAFF_TOKEN)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["total"], 0);
    assert_eq!(body["data"]["estimates"].as_array().unwrap().len(), 0);

    // Fetching by id through the other tenant's slug is a miss.
    let res = client
        .get(format!(
            "{}/t/{}/api/estimates/{}",
            server.base_url, slug_b, estimate_id
        ))
        .bearer_auth(common::STAFF_TOKEN)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Addressing the owning tenant still works.
    let res = client
        .get(format!(
            "{}/t/{}/api/estimates/{}",
            server.base_url, slug_a, estimate_id
        ))
        .bearer_auth(common::STAFF_TOKEN)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    Ok(())
}

// A verify that fails after the token row is matched must not burn the
// token: once the tenant behind it exists again, the token still works.
#[tokio::test]
async fn failed_verify_keeps_the_token_usable() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_available(server).await {
        eprintln!("skipping: no database available");
        return Ok(());
    }

    let client = reqwest::Client::new();
    let slug = unique_slug("revive");

    let res = client
        .post(format!("{}/api/auth/signup", server.base_url))
        .json(&signup_body(&slug, "Revive Garage"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    let token = body["data"]["verification_token"]
        .as_str()
        .expect("development server echoes the verification token")
        .to_string();

    // Drop the tenant out from under the token.
    let status = std::process::Command::new("target/debug/graft")
        .args(["tenant", "delete", &slug, "--yes"])
        .env("GRAFT_ENV", "development")
        .status()?;
    assert!(status.success(), "tenant delete failed");

    let res = client
        .post(format!("{}/api/auth/verify", server.base_url))
        .json(&json!({ "token": token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Re-provision the slug; the original token was not consumed by the
    // failed attempt and starts a session.
    let res = client
        .post(format!("{}/api/auth/signup", server.base_url))
        .json(&signup_body(&slug, "Revive Garage"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/api/auth/verify", server.base_url))
        .json(&json!({ "token": token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    Ok(())
}
