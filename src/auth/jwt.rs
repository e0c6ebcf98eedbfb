use chrono::Utc;
use jsonwebtoken::errors::{Error, ErrorKind};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::models::{Claims, TokenType};

/// Identity baked into every token we issue.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: u64,
    pub username: String,
    pub role: u8,
    pub employee_id: Option<u64>,
    pub employee_name: Option<String>,
}

impl From<&Claims> for TokenSubject {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.sub.clone(),
            role: claims.role,
            employee_id: claims.employee_id,
            employee_name: claims.employee_name.clone(),
        }
    }
}

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

pub fn issue_token(
    subject: &TokenSubject,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    // never sign with an unset JWT_SECRET
    if secret.is_empty() {
        return Err(ErrorKind::InvalidKeyFormat.into());
    }

    let claims = Claims {
        user_id: subject.user_id,
        sub: subject.username.clone(),
        role: subject.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        employee_id: subject.employee_id,
        employee_name: subject.employee_name.clone(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(subject: &TokenSubject, secret: &str, ttl: usize) -> Result<String, Error> {
    issue_token(subject, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    subject: &TokenSubject,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    issue_token(subject, TokenType::Refresh, secret, ttl)
}

pub fn generate_reset_token(
    subject: &TokenSubject,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    issue_token(subject, TokenType::PasswordReset, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    if secret.is_empty() {
        return Err("JWT_SECRET is not configured".into());
    }

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: 7,
            username: "ayu".into(),
            role: 3,
            employee_id: Some(1),
            employee_name: Some("Ayu".into()),
        }
    }

    #[test]
    fn access_token_round_trips() {
        let token = generate_access_token(&subject(), "s3cret", 900).unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.employee_name.as_deref(), Some("Ayu"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = generate_refresh_token(&subject(), "s3cret", 900).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn each_token_gets_a_fresh_jti() {
        let (_, a) = generate_reset_token(&subject(), "s3cret", 60).unwrap();
        let (_, b) = generate_reset_token(&subject(), "s3cret", 60).unwrap();
        assert_ne!(a.jti, b.jti);
        assert_eq!(a.token_type, TokenType::PasswordReset);
    }

    #[test]
    fn subject_survives_claims() {
        let (_, claims) = generate_refresh_token(&subject(), "s3cret", 60).unwrap();
        let back = TokenSubject::from(&claims);
        assert_eq!(back.username, "ayu");
        assert_eq!(back.employee_id, Some(1));
    }

    #[test]
    fn empty_secret_never_signs() {
        assert!(generate_access_token(&subject(), "", 60).is_err());
        assert!(verify_token("a.b.c", "").is_err());
    }
}
