use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::database::models::Booking;
use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

use super::DocPath;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub booked_by: Option<String>,
    pub booking_date: Option<String>,
    pub booking_time: Option<String>,
    pub service_type: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub location_address: Option<String>,
    pub location_postcode: Option<String>,
    pub issue_description: Option<String>,
    pub notes: Option<String>,
}

const REQUIRED_FIELDS: &[(&str, fn(&CreateBookingRequest) -> &Option<String>)] = &[
    ("booked_by", |r| &r.booked_by),
    ("booking_date", |r| &r.booking_date),
    ("booking_time", |r| &r.booking_time),
    ("service_type", |r| &r.service_type),
    ("customer_name", |r| &r.customer_name),
    ("customer_phone", |r| &r.customer_phone),
    ("vehicle_make", |r| &r.vehicle_make),
    ("vehicle_model", |r| &r.vehicle_model),
    ("vehicle_reg", |r| &r.vehicle_reg),
    ("location_address", |r| &r.location_address),
    ("location_postcode", |r| &r.location_postcode),
    ("issue_description", |r| &r.issue_description),
];

/// Strip whitespace from phone numbers: "07700 900 123" -> "07700900123".
fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Booking times arrive as "HH:MM" or "HH:MM:SS".
fn parse_booking_time(value: &str) -> Option<NaiveTime> {
    let with_seconds = if value.matches(':').count() == 1 {
        format!("{}:00", value)
    } else {
        value.to_string()
    };
    NaiveTime::parse_from_str(&with_seconds, "%H:%M:%S").ok()
}

/// POST .../bookings - create a booking
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(body): Json<CreateBookingRequest>,
) -> ApiResult<Booking> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .filter(|(_, get)| {
            get(&body)
                .as_deref()
                .map(str::trim)
                .map_or(true, str::is_empty)
        })
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    // All unwraps below are guarded by the required-field check.
    let date_str = body.booking_date.as_deref().unwrap_or_default();
    let booking_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("booking_date must be YYYY-MM-DD"))?;
    let booking_time = parse_booking_time(body.booking_time.as_deref().unwrap_or_default())
        .ok_or_else(|| ApiError::bad_request("booking_time must be HH:MM"))?;

    let mut tx = db.begin().await?;

    let clash: Option<(i32,)> = sqlx::query_as(
        "SELECT id FROM bookings WHERE booking_date = $1 AND booking_time = $2 AND status != 'cancelled'",
    )
    .bind(booking_date)
    .bind(booking_time)
    .fetch_optional(&mut *tx)
    .await?;
    if clash.is_some() {
        return Err(ApiError::conflict("That date and time is already booked"));
    }

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (
            booked_by, booking_date, booking_time, service_type,
            customer_name, customer_phone, customer_email,
            vehicle_make, vehicle_model, vehicle_reg,
            location_address, location_postcode, issue_description, notes,
            status, estimated_duration
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'confirmed', 90)
        RETURNING *
        "#,
    )
    .bind(body.booked_by.as_deref().map(str::trim))
    .bind(booking_date)
    .bind(booking_time)
    .bind(body.service_type.as_deref().map(str::trim))
    .bind(body.customer_name.as_deref().map(str::trim))
    .bind(normalize_phone(body.customer_phone.as_deref().unwrap_or_default()))
    .bind(body.customer_email.as_deref().map(str::trim))
    .bind(body.vehicle_make.as_deref().map(str::trim))
    .bind(body.vehicle_model.as_deref().map(str::trim))
    .bind(body.vehicle_reg.as_deref().map(|s| s.trim().to_uppercase()))
    .bind(body.location_address.as_deref().map(str::trim))
    .bind(body.location_postcode.as_deref().map(|s| s.trim().to_uppercase()))
    .bind(body.issue_description.as_deref().map(str::trim))
    .bind(body.notes.as_deref())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        // A concurrent request can slip past the clash check above; the
        // partial unique index on (booking_date, booking_time) catches it.
        if let sqlx::Error::Database(db) = &e {
            if db.code().as_deref() == Some("23505") {
                return ApiError::conflict("That date and time is already booked");
            }
        }
        e.into()
    })?;

    tx.commit().await?;
    Ok(ApiResponse::created(booking))
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub upcoming: Option<bool>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET .../bookings - list bookings, date then time order
pub async fn list(
    Extension(db): Extension<TenantDb>,
    Query(query): Query<ListBookingsQuery>,
) -> ApiResult<serde_json::Value> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);
    let upcoming = query.upcoming.unwrap_or(false);

    let mut tx = db.begin().await?;

    #[derive(sqlx::FromRow)]
    struct Counted {
        total_count: i64,
        #[sqlx(flatten)]
        booking: Booking,
    }

    let rows = sqlx::query_as::<_, Counted>(
        r#"
        SELECT COUNT(*) OVER() AS total_count, *
        FROM bookings
        WHERE ($1::date IS NULL OR booking_date >= $1)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY booking_date, booking_time
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(upcoming.then(|| Utc::now().date_naive()))
    .bind(query.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    let bookings: Vec<Booking> = rows.into_iter().map(|r| r.booking).collect();

    Ok(ApiResponse::success(json!({
        "bookings": bookings,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}

/// GET .../bookings/:id
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Booking> {
    let mut tx = db.begin().await?;
    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;
    tx.commit().await?;
    Ok(ApiResponse::success(booking))
}

/// POST .../bookings/:id/complete
pub async fn complete(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Booking> {
    let mut tx = db.begin().await?;
    let booking = sqlx::query_as::<_, Booking>(
        "UPDATE bookings SET status = 'completed', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Booking not found"))?;
    tx.commit().await?;
    Ok(ApiResponse::success(booking))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_phone_whitespace() {
        assert_eq!(normalize_phone("07700 900 123"), "07700900123");
        assert_eq!(normalize_phone(" 07700\t900123 "), "07700900123");
        assert_eq!(normalize_phone("07700900123"), "07700900123");
    }

    #[test]
    fn appends_seconds_to_booking_times() {
        assert_eq!(
            parse_booking_time("09:30"),
            NaiveTime::from_hms_opt(9, 30, 0)
        );
        assert_eq!(
            parse_booking_time("09:30:15"),
            NaiveTime::from_hms_opt(9, 30, 15)
        );
        assert_eq!(parse_booking_time("not a time"), None);
        assert_eq!(parse_booking_time("25:00"), None);
    }

    #[test]
    fn lists_missing_required_fields() {
        let body = CreateBookingRequest {
            booked_by: Some("Dave".into()),
            booking_date: Some("2026-09-01".into()),
            booking_time: None,
            service_type: Some("MOT".into()),
            customer_name: Some("  ".into()),
            customer_phone: Some("07700900123".into()),
            customer_email: None,
            vehicle_make: Some("Ford".into()),
            vehicle_model: Some("Focus".into()),
            vehicle_reg: Some("AB12 CDE".into()),
            location_address: Some("1 High St".into()),
            location_postcode: Some("sw1a 1aa".into()),
            issue_description: Some("Rattle".into()),
            notes: None,
        };
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .filter(|(_, get)| {
                get(&body)
                    .as_deref()
                    .map(str::trim)
                    .map_or(true, str::is_empty)
            })
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(missing, vec!["booking_time", "customer_name"]);
    }
}
