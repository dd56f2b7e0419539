use jsonwebtoken::TokenData;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{error::Error, util::ObjectIdString};

use super::auth::UserModel;

/// How long an issued token stays valid.
pub const TOKEN_TTL: Duration = Duration::days(7);

#[derive(Clone)]
pub struct JwtState {
    validation: jsonwebtoken::Validation,
    header: jsonwebtoken::Header,

    encoding_key: jsonwebtoken::EncodingKey,
    decoding_key: jsonwebtoken::DecodingKey,
}

impl JwtState {
    pub fn new(secret: &[u8]) -> Self {
        let encoding_key = jsonwebtoken::EncodingKey::from_secret(secret);
        let decoding_key = jsonwebtoken::DecodingKey::from_secret(secret);

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        // expiry is checked manually via TokenClaims::is_expired
        validation.validate_exp = false;

        Self {
            header,
            validation,

            encoding_key,
            decoding_key,
        }
    }

    pub fn new_from_env() -> Self {
        let secret = std::env::var("SECRET_KEY")
            .expect("Cannot retrieve SECRET_KEY from environment variable.");

        Self::new(secret.as_bytes())
    }
}

pub fn current_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenClaims {
    pub sub: ObjectIdString,
    pub exp: i64,
}

impl TokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp < current_timestamp().unix_timestamp()
    }
}

pub struct GenerateTokenResponse {
    pub expired_at: OffsetDateTime,
    pub token: String,
}

pub fn generate_token(
    jwt_state: &JwtState,
    user: &UserModel,
) -> Result<GenerateTokenResponse, Error> {
    let expired_at = current_timestamp() + TOKEN_TTL;
    let token = generate_token_with_exp(jwt_state, user, expired_at.unix_timestamp())?;

    Ok(GenerateTokenResponse { expired_at, token })
}

pub fn generate_token_with_exp(
    jwt_state: &JwtState,
    user: &UserModel,
    exp: i64,
) -> Result<String, Error> {
    jsonwebtoken::encode(
        &jwt_state.header,
        &TokenClaims {
            sub: user.id.into(),
            exp,
        },
        &jwt_state.encoding_key,
    )
    .map_err(Into::into)
}

pub fn decode_token(jwt_state: &JwtState, token: &str) -> Result<TokenData<TokenClaims>, Error> {
    jsonwebtoken::decode(token, &jwt_state.decoding_key, &jwt_state.validation).map_err(Into::into)
}
