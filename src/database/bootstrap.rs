//! Shared-table bootstrap and the per-tenant schema DDL template.
//!
//! Everything here is idempotent (`CREATE ... IF NOT EXISTS`) so it can run
//! at every server startup and from `graft db init`.

use sqlx::PgPool;
use tracing::info;

use super::manager::DatabaseError;
use super::tenant::quote_identifier;

/// Create the public-schema tables shared by all tenants.
pub async fn ensure_shared_tables(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS public.tenants (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            slug VARCHAR(100) UNIQUE NOT NULL,
            business_name VARCHAR(255) NOT NULL,
            trade_type VARCHAR(50) NOT NULL DEFAULT 'general',
            owner_email VARCHAR(255) UNIQUE NOT NULL,
            owner_name VARCHAR(255),
            phone VARCHAR(50),
            subscription_tier VARCHAR(50) NOT NULL DEFAULT 'trial',
            subscription_status VARCHAR(50) NOT NULL DEFAULT 'trial',
            trial_ends_at TIMESTAMPTZ,
            schema_name VARCHAR(100) NOT NULL,
            primary_color VARCHAR(20) NOT NULL DEFAULT '#3B82F6',
            email_verified BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS public.magic_tokens (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email VARCHAR(255) NOT NULL,
            token_hash VARCHAR(64) UNIQUE NOT NULL,
            tenant_slug VARCHAR(100),
            token_type VARCHAR(20) NOT NULL CHECK (token_type IN ('login', 'verification')),
            expires_at TIMESTAMPTZ NOT NULL,
            used BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_magic_tokens_hash ON public.magic_tokens(token_hash)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS public.share_token_lookup (
            share_token VARCHAR(64) PRIMARY KEY,
            tenant_slug VARCHAR(100) NOT NULL,
            tenant_schema VARCHAR(100) NOT NULL,
            document_type VARCHAR(20) NOT NULL CHECK (document_type IN ('estimate', 'invoice', 'assessment')),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Shared tables ready");
    Ok(())
}

/// DDL statements that provision one tenant's schema. The schema name must
/// already be validated; it is interpolated quoted.
pub fn tenant_schema_statements(schema_name: &str) -> Vec<String> {
    let s = quote_identifier(schema_name);

    vec![
        format!("CREATE SCHEMA IF NOT EXISTS {s}"),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.bookings (
                id SERIAL PRIMARY KEY,
                booked_by VARCHAR(255) NOT NULL,
                booking_date DATE NOT NULL,
                booking_time TIME NOT NULL,
                service_type VARCHAR(100) NOT NULL,
                customer_name VARCHAR(255) NOT NULL,
                customer_phone VARCHAR(20) NOT NULL,
                customer_email VARCHAR(255),
                vehicle_make VARCHAR(100),
                vehicle_model VARCHAR(100),
                vehicle_reg VARCHAR(20),
                location_address TEXT NOT NULL,
                location_postcode VARCHAR(20) NOT NULL,
                issue_description TEXT NOT NULL,
                notes TEXT,
                status VARCHAR(50) NOT NULL DEFAULT 'confirmed',
                estimated_duration INTEGER NOT NULL DEFAULT 90,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_bookings_date ON {s}.bookings(booking_date)"),
        format!("CREATE INDEX IF NOT EXISTS idx_bookings_status ON {s}.bookings(status)"),
        // Closes the race between two requests booking the same slot;
        // cancelled bookings free the slot up again.
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_slot ON {s}.bookings(booking_date, booking_time) WHERE status != 'cancelled'"
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.estimates (
                id SERIAL PRIMARY KEY,
                estimate_number VARCHAR(50) UNIQUE NOT NULL,
                estimate_date DATE NOT NULL DEFAULT CURRENT_DATE,
                status VARCHAR(50) NOT NULL DEFAULT 'draft',
                client_name VARCHAR(255) NOT NULL,
                client_email VARCHAR(255),
                client_address TEXT,
                client_phone VARCHAR(20),
                vehicle_make VARCHAR(100),
                vehicle_model VARCHAR(100),
                vehicle_reg VARCHAR(20),
                subtotal DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                vat_rate DECIMAL(5, 2) NOT NULL DEFAULT 20.00,
                vat_amount DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                total DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                notes TEXT,
                signature_data TEXT,
                share_token VARCHAR(64) UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_estimates_status ON {s}.estimates(status)"),
        format!("CREATE INDEX IF NOT EXISTS idx_estimates_share_token ON {s}.estimates(share_token)"),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.invoices (
                id SERIAL PRIMARY KEY,
                invoice_number VARCHAR(50) UNIQUE NOT NULL,
                invoice_date DATE NOT NULL DEFAULT CURRENT_DATE,
                due_date DATE,
                status VARCHAR(50) NOT NULL DEFAULT 'draft',
                client_name VARCHAR(255) NOT NULL,
                client_email VARCHAR(255),
                client_address TEXT,
                client_phone VARCHAR(20),
                vehicle_make VARCHAR(100),
                vehicle_model VARCHAR(100),
                vehicle_reg VARCHAR(20),
                subtotal DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                vat_rate DECIMAL(5, 2) NOT NULL DEFAULT 20.00,
                vat_amount DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                total DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                amount_paid DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                balance_due DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                payment_date DATE,
                paid_at TIMESTAMPTZ,
                notes TEXT,
                share_token VARCHAR(64) UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_invoices_status ON {s}.invoices(status)"),
        format!("CREATE INDEX IF NOT EXISTS idx_invoices_share_token ON {s}.invoices(share_token)"),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.line_items (
                id SERIAL PRIMARY KEY,
                document_type VARCHAR(20) NOT NULL CHECK (document_type IN ('estimate', 'invoice')),
                document_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                quantity DECIMAL(10, 2) NOT NULL DEFAULT 1.00,
                rate DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                amount DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
                sort_order INTEGER NOT NULL DEFAULT 0
            )
            "#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_line_items_document ON {s}.line_items(document_type, document_id)"
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.document_photos (
                id SERIAL PRIMARY KEY,
                document_type VARCHAR(20) NOT NULL,
                document_id INTEGER NOT NULL,
                file_name VARCHAR(255),
                mime_type VARCHAR(100),
                photo_url VARCHAR(500),
                caption TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_document_photos_document ON {s}.document_photos(document_type, document_id)"
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.receipts (
                id SERIAL PRIMARY KEY,
                receipt_number VARCHAR(50) UNIQUE NOT NULL,
                receipt_date DATE NOT NULL DEFAULT CURRENT_DATE,
                supplier VARCHAR(255) NOT NULL,
                description TEXT,
                amount DECIMAL(10, 2) NOT NULL,
                category VARCHAR(100),
                status VARCHAR(50) NOT NULL DEFAULT 'pending',
                storage_file_id VARCHAR(255),
                storage_file_url VARCHAR(500),
                storage_folder_path VARCHAR(255),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_receipts_date ON {s}.receipts(receipt_date DESC)"),
        format!("CREATE INDEX IF NOT EXISTS idx_receipts_supplier ON {s}.receipts(supplier)"),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.damage_assessments (
                id SERIAL PRIMARY KEY,
                assessment_number VARCHAR(50) UNIQUE NOT NULL,
                assessment_date DATE NOT NULL DEFAULT CURRENT_DATE,
                status VARCHAR(50) NOT NULL DEFAULT 'draft',
                client_name VARCHAR(255) NOT NULL,
                client_email VARCHAR(255),
                client_phone VARCHAR(20),
                vehicle_make VARCHAR(100),
                vehicle_model VARCHAR(100),
                vehicle_reg VARCHAR(20) NOT NULL,
                vehicle_year VARCHAR(10),
                vehicle_colour VARCHAR(50),
                mileage INTEGER,
                damage_description TEXT,
                damage_locations JSONB,
                repair_notes TEXT,
                photos JSONB,
                estimated_cost DECIMAL(10, 2),
                share_token VARCHAR(64) UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_damage_assessments_share_token ON {s}.damage_assessments(share_token)"
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.jotter_notes (
                id SERIAL PRIMARY KEY,
                customer_name VARCHAR(255),
                customer_phone VARCHAR(50),
                customer_email VARCHAR(255),
                vehicle_make VARCHAR(100),
                vehicle_model VARCHAR(100),
                vehicle_reg VARCHAR(20),
                vehicle_year VARCHAR(10),
                issue_description TEXT,
                notes TEXT,
                raw_input TEXT,
                confidence_score DECIMAL(5, 4),
                status VARCHAR(20) NOT NULL DEFAULT 'new'
                    CHECK (status IN ('new', 'reviewed', 'converted', 'archived')),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_jotter_notes_status ON {s}.jotter_notes(status)"),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.business_settings (
                id INTEGER PRIMARY KEY DEFAULT 1 CHECK (id = 1),
                business_name VARCHAR(255),
                address TEXT,
                postcode VARCHAR(20),
                phone VARCHAR(50),
                email VARCHAR(255),
                website VARCHAR(255),
                vat_registered BOOLEAN NOT NULL DEFAULT false,
                vat_number VARCHAR(50),
                default_vat_rate DECIMAL(5, 2) NOT NULL DEFAULT 20.00,
                bank_name VARCHAR(100),
                bank_account_name VARCHAR(255),
                bank_sort_code VARCHAR(20),
                bank_account_number VARCHAR(20),
                payment_terms TEXT,
                invoice_footer TEXT,
                line_item_label VARCHAR(50) NOT NULL DEFAULT 'Items',
                show_vehicle_fields BOOLEAN NOT NULL DEFAULT true,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ),
    ]
}
