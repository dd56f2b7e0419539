use argon2::Argon2;
use axum::{
    extract::{FromRef, FromRequestParts, State},
    headers::{Cookie, Header, SetCookie},
    http::{request::Parts, HeaderValue},
    Json, RequestPartsExt, TypedHeader,
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    checkout::validate_contact,
    error::{Error, UnauthorizedType},
    mongo_ext::Collection,
    util::{hash_password, verify_password, FormattedDateTime, ObjectIdString},
};

use super::token::{decode_token, generate_token, JwtState, TOKEN_TTL};

pub const TOKEN_COOKIE: &str = "token";

#[derive(Clone)]
pub struct UserCollection(pub Collection<UserModel>);

impl std::ops::Deref for UserCollection {
    type Target = Collection<UserModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub fullname: String,
    pub email: String,
    pub password: String,
    pub contact: String,

    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub profile_picture: String,

    #[serde(default)]
    pub admin: bool,

    pub last_login: Option<bson::DateTime>,

    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

/// User as returned to clients. The password hash never leaves the server.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserResponse {
    pub id: ObjectIdString,

    pub fullname: String,
    pub email: String,
    pub contact: String,

    pub address: String,
    pub city: String,
    pub country: String,
    pub profile_picture: String,

    pub admin: bool,

    pub last_login: Option<FormattedDateTime>,

    pub created_at: FormattedDateTime,
    pub updated_at: FormattedDateTime,
}

impl From<UserModel> for UserResponse {
    fn from(value: UserModel) -> Self {
        Self {
            id: value.id.into(),
            fullname: value.fullname,
            email: value.email,
            contact: value.contact,

            address: value.address,
            city: value.city,
            country: value.country,
            profile_picture: value.profile_picture,

            admin: value.admin,

            last_login: value.last_login.map(Into::into),

            created_at: value.created_at.into(),
            updated_at: value.updated_at.into(),
        }
    }
}

/// Authenticated caller identity, decoded from the `token` cookie without
/// touching the database.
#[derive(Debug, Clone, Copy)]
pub struct UserAccess {
    pub id: ObjectId,
}

impl UserAccess {
    pub fn from_token(jwt_state: &JwtState, token: &str) -> Result<Self, Error> {
        let token = decode_token(jwt_state, token)
            .map_err(|_| Error::Unauthorized(UnauthorizedType::InvalidToken))?;

        if token.claims.is_expired() {
            return Err(Error::Unauthorized(UnauthorizedType::InvalidToken));
        }

        Ok(Self {
            id: token.claims.sub.0,
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserAccess
where
    JwtState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookie = parts
            .extract::<TypedHeader<Cookie>>()
            .await
            .map_err(|_| Error::Unauthorized(UnauthorizedType::MissingToken))
            .tap_err(|_| tracing::debug!("cookie header not found"))?;

        let token = cookie
            .get(TOKEN_COOKIE)
            .ok_or(Error::Unauthorized(UnauthorizedType::MissingToken))
            .tap_err(|_| tracing::debug!("token cookie not found"))?;

        let jwt = JwtState::from_ref(state);

        Self::from_token(&jwt, token)
    }
}

impl UserModel {
    pub async fn from_id(
        id: ObjectId,
        UserCollection(users): &UserCollection,
    ) -> Result<Self, Error> {
        users
            .find_one_by_id(id)
            .await?
            .ok_or(Error::Unauthorized(UnauthorizedType::InvalidToken))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserModel
where
    JwtState: FromRef<S>,
    UserCollection: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let access = parts.extract_with_state::<UserAccess, _>(state).await?;
        let users = UserCollection::from_ref(state);
        Self::from_id(access.id, &users).await
    }
}

fn set_cookie(value: String) -> Result<TypedHeader<SetCookie>, Error> {
    let value = HeaderValue::from_str(&value)
        .map_err(|err| Error::Internal(anyhow::anyhow!("invalid cookie value: {err}")))?;

    SetCookie::decode(&mut [value].as_slice().iter())
        .map(TypedHeader)
        .map_err(|err| Error::Internal(anyhow::anyhow!("invalid set-cookie header: {err}")))
}

fn auth_cookie(token: &str) -> Result<TypedHeader<SetCookie>, Error> {
    set_cookie(format!(
        "{TOKEN_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        TOKEN_TTL.whole_seconds()
    ))
}

fn expired_auth_cookie() -> Result<TypedHeader<SetCookie>, Error> {
    set_cookie(format!(
        "{TOKEN_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
    ))
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 124))]
    pub fullname: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 64))]
    pub password: String,

    #[validate(custom = "validate_contact")]
    pub contact: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
}

pub async fn create_user(
    users: &UserCollection,
    argon: &Argon2<'_>,
    request: SignupRequest,
) -> Result<UserModel, Error> {
    request.validate()?;

    let count = users
        .count_documents(bson::doc! { "email": &request.email }, None)
        .await?;

    if count > 0 {
        return Err(Error::EmailTaken);
    }

    let model = UserModel {
        id: ObjectId::new(),
        fullname: request.fullname,
        email: request.email,
        password: hash_password(argon, &request.password)?,
        contact: request.contact,
        address: String::new(),
        city: String::new(),
        country: String::new(),
        profile_picture: String::new(),
        // the admin flag is only ever granted through the admin endpoint
        admin: false,
        last_login: None,
        created_at: OffsetDateTime::now_utc().into(),
        updated_at: OffsetDateTime::now_utc().into(),
    };
    users.insert_one(&model, None).await?;

    Ok(model)
}

pub async fn signup(
    State(users): State<UserCollection>,
    State(jwt_state): State<JwtState>,
    State(argon): State<Argon2<'static>>,
    Json(request): Json<SignupRequest>,
) -> Result<(TypedHeader<SetCookie>, Json<AuthResponse>), Error> {
    let user = create_user(&users, &argon, request).await?;

    let token = generate_token(&jwt_state, &user)?;
    let header = auth_cookie(&token.token)?;

    Ok((
        header,
        Json(AuthResponse {
            success: true,
            message: "Account created successfully.".to_string(),
            user: user.into(),
        }),
    ))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(users): State<UserCollection>,
    State(jwt_state): State<JwtState>,
    State(argon): State<Argon2<'static>>,
    Json(request): Json<LoginRequest>,
) -> Result<(TypedHeader<SetCookie>, Json<AuthResponse>), Error> {
    let user = users
        .find_one(bson::doc! { "email": &request.email }, None)
        .await?;

    let mut user = match user {
        Some(user) if verify_password(&argon, &request.password, &user.password) => user,
        _ => return Err(Error::Unauthorized(UnauthorizedType::WrongCredentials)),
    };

    let last_login = bson::DateTime::from(OffsetDateTime::now_utc());
    users
        .update_one_by_id(user.id, bson::doc! { "$set": { "last_login": last_login } })
        .await?;
    user.last_login = Some(last_login);

    let token = generate_token(&jwt_state, &user)?;
    let header = auth_cookie(&token.token)?;

    let message = format!("Welcome back, {}!", user.fullname);
    Ok((
        header,
        Json(AuthResponse {
            success: true,
            message,
            user: user.into(),
        }),
    ))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

pub async fn logout() -> Result<(TypedHeader<SetCookie>, Json<MessageResponse>), Error> {
    Ok((
        expired_auth_cookie()?,
        Json(MessageResponse {
            success: true,
            message: "Logged out successfully.".to_string(),
        }),
    ))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CheckAuthResponse {
    pub success: bool,
    pub user: UserResponse,
}

pub async fn check_auth(user: UserModel) -> Json<CheckAuthResponse> {
    Json(CheckAuthResponse {
        success: true,
        user: user.into(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::{extract::FromRequestParts, Json};

    use crate::{
        api::v1::tests::bootstrap,
        error::{Error, UnauthorizedType},
    };

    fn signup_request(email: &str) -> super::SignupRequest {
        super::SignupRequest {
            fullname: "name".to_string(),
            email: email.to_string(),
            password: "password".to_string(),
            contact: "9876543210".to_string(),
        }
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGODB_URI)"]
    async fn test_signup_and_login() {
        let bootstrap = bootstrap().await;

        let (_, Json(created)) = super::signup(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            bootstrap.argon(),
            Json(signup_request("email@test.com")),
        )
        .await
        .unwrap();
        assert!(created.success);
        assert!(!created.user.admin);

        let (_, Json(logged_in)) = super::login(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            bootstrap.argon(),
            Json(super::LoginRequest {
                email: "email@test.com".to_string(),
                password: "password".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(logged_in.user.last_login.is_some());

        let err = super::login(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            bootstrap.argon(),
            Json(super::LoginRequest {
                email: "email@test.com".to_string(),
                password: "wrongpassword".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_matches!(err, Error::Unauthorized(UnauthorizedType::WrongCredentials));
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGODB_URI)"]
    async fn test_signup_duplicate_email_issues_no_token() {
        let bootstrap = bootstrap().await;

        let _ = super::signup(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            bootstrap.argon(),
            Json(signup_request("email@test.com")),
        )
        .await
        .unwrap();

        let err = super::signup(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            bootstrap.argon(),
            Json(signup_request("email@test.com")),
        )
        .await
        .unwrap_err();

        assert_matches!(err, Error::EmailTaken);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGODB_URI)"]
    async fn test_user_access_from_cookie() {
        let bootstrap = bootstrap().await;

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header("Cookie", format!("token={}", bootstrap.user_token()))
            .body(())
            .unwrap()
            .into_parts();

        let access = super::UserAccess::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap();
        assert_eq!(access.id, bootstrap.user_id());

        let model = super::UserModel::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap();
        assert_eq!(model, bootstrap.user_model);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGODB_URI)"]
    async fn test_missing_or_expired_token_is_unauthorized() {
        let bootstrap = bootstrap().await;

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .body(())
            .unwrap()
            .into_parts();

        let err = super::UserAccess::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap_err();
        assert_matches!(err, Error::Unauthorized(UnauthorizedType::MissingToken));

        let expired = super::super::token::generate_token_with_exp(
            &bootstrap.app_state.jwt_state,
            &bootstrap.user_model,
            0,
        )
        .unwrap();

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header("Cookie", format!("token={expired}"))
            .body(())
            .unwrap()
            .into_parts();

        let err = super::UserAccess::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap_err();
        assert_matches!(err, Error::Unauthorized(UnauthorizedType::InvalidToken));
    }
}
