use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;

/// Bearer tokens expire this long after issuance.
pub const TOKEN_LIFETIME_MINUTES: i64 = 30;

/// JWT Claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User email
    pub jti: String, // Unique token id
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed bearer token.
#[derive(Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign a new JWT for `subject`, valid for [`TOKEN_LIFETIME_MINUTES`] from now.
pub fn sign(subject: &str, auth: &AuthConfig) -> Result<IssuedToken> {
    sign_at(subject, Utc::now(), auth)
}

/// Sign a JWT as if it had been issued at `issued_at`.
pub fn sign_at(subject: &str, issued_at: DateTime<Utc>, auth: &AuthConfig) -> Result<IssuedToken> {
    let expires_at = issued_at + Duration::minutes(TOKEN_LIFETIME_MINUTES);

    let claims = Claims {
        sub: subject.to_owned(),
        jti: Uuid::new_v4().to_string(),
        iss: auth.jwt_issuer.clone(),
        aud: auth.jwt_audience.clone(),
        iat: issued_at.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )?;

    Ok(IssuedToken { token, expires_at })
}

/// Verify signature, issuer, audience and expiry (no clock skew) and decode the claims.
pub fn verify(token: &str, auth: &AuthConfig) -> jsonwebtoken::errors::Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[&auth.jwt_issuer]);
    validation.set_audience(&[&auth.jwt_audience]);
    validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}
