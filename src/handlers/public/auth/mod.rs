pub mod login;
pub mod session;
pub mod signup;
pub mod verify;

use sqlx::PgPool;

use crate::auth::{hash_magic_token, random_token, MagicTokenType};
use crate::config::config;
use crate::error::ApiError;

/// Issue a magic token: random 32 bytes hex, stored hashed. Returns the
/// raw token (echoed to the client only in development).
pub(crate) async fn issue_magic_token(
    pool: &PgPool,
    email: &str,
    tenant_slug: &str,
    token_type: MagicTokenType,
) -> Result<String, ApiError> {
    let token = random_token();
    sqlx::query(
        r#"
        INSERT INTO public.magic_tokens (email, token_hash, tenant_slug, token_type, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + $5::interval)
        "#,
    )
    .bind(email)
    .bind(hash_magic_token(&token))
    .bind(tenant_slug)
    .bind(token_type.as_str())
    .bind(format!("{} seconds", token_type.expiry().num_seconds()))
    .execute(pool)
    .await?;
    Ok(token)
}

/// In development the magic token is echoed so the login flow can be
/// driven without email delivery; elsewhere the response only
/// acknowledges.
pub(crate) fn maybe_echo_token(token: String) -> Option<String> {
    config().session.echo_magic_tokens.then_some(token)
}

/// Surface-level email shape check; real validation is the delivery.
pub(crate) fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
        && email.matches('@').count() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_email_shapes() {
        assert!(is_valid_email("dave@garage.co.uk"));
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@nodomain.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.leading"));
        assert!(!is_valid_email("two@@ats.com"));
        assert!(!is_valid_email("spa ce@mail.com"));
    }
}
