use std::sync::Arc;

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::AppError;

/// Identity resolved from a verified bearer token
///
/// Token issuance lives in the identity service; this API only verifies.
/// Note the reconciler does not trust this identity per-record — submitted
/// faculty ids are cross-checked against section ownership during validation.
#[derive(Debug, Clone)]
pub struct AuthenticatedFaculty {
    pub faculty_id: String,
    pub session_id: Option<String>,
}

#[derive(Clone)]
pub struct FacultyJwtVerifier {
    decoding_key: DecodingKey,
    config: Arc<AppConfig>,
}

impl FacultyJwtVerifier {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            config,
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AuthenticatedFaculty, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let decoded = decode::<FacultyClaims>(token, &self.decoding_key, &validation).map_err(
            |error| AppError::unauthorized(format!("Token validation failed: {}", sanitize(&error))),
        )?;

        if !audience_matches(decoded.claims.aud.as_ref(), &self.config.jwt_audience) {
            return Err(AppError::unauthorized("Token audience is not allowed"));
        }
        if decoded.claims.sub.trim().is_empty() {
            return Err(AppError::unauthorized("Token subject is missing"));
        }
        if decoded.claims.role.as_deref() != Some("faculty") {
            return Err(AppError::unauthorized("Token role is not allowed"));
        }
        validate_temporal_claims(&decoded.claims, self.config.auth_clock_skew)?;

        Ok(AuthenticatedFaculty {
            faculty_id: decoded.claims.sub,
            session_id: decoded.claims.session_id.or(decoded.claims.jti),
        })
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

#[derive(Debug, Deserialize)]
struct FacultyClaims {
    sub: String,
    aud: Option<Value>,
    role: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
    nbf: Option<i64>,
    jti: Option<String>,
    session_id: Option<String>,
}

fn validate_temporal_claims(
    claims: &FacultyClaims,
    clock_skew: std::time::Duration,
) -> Result<(), AppError> {
    let now = chrono::Utc::now().timestamp();
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(0);

    let exp = claims
        .exp
        .ok_or_else(|| AppError::unauthorized("Token missing `exp` claim"))?;
    if exp <= now.saturating_sub(skew) {
        return Err(AppError::unauthorized("Token is expired"));
    }

    let iat = claims
        .iat
        .ok_or_else(|| AppError::unauthorized("Token missing `iat` claim"))?;
    if iat > now.saturating_add(skew) {
        return Err(AppError::unauthorized("Token `iat` is in the future"));
    }

    if let Some(nbf) = claims.nbf {
        if nbf > now.saturating_add(skew) {
            return Err(AppError::unauthorized("Token is not yet valid"));
        }
    }

    Ok(())
}

fn audience_matches(aud: Option<&Value>, expected: &str) -> bool {
    let Some(aud) = aud else {
        return false;
    };

    match aud {
        Value::String(value) => value == expected,
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .any(|value| value == expected),
        _ => false,
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
