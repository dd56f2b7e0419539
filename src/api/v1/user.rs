use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    error::Error,
    util::{ObjectIdString, PathObjectId},
};

use super::auth::{AuthResponse, UserCollection, UserModel, UserResponse};

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 124))]
    pub fullname: String,

    #[validate(email)]
    pub email: String,

    pub address: String,
    pub city: String,
    pub country: String,

    #[serde(default)]
    pub profile_picture: String,
}

pub async fn update_profile(
    State(users): State<UserCollection>,
    user: UserModel,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<AuthResponse>, Error> {
    request.validate()?;

    let updated = UserModel {
        fullname: request.fullname,
        email: request.email,
        address: request.address,
        city: request.city,
        country: request.country,
        profile_picture: request.profile_picture,
        updated_at: OffsetDateTime::now_utc().into(),
        ..user
    };

    users
        .update_one_by_id(
            updated.id,
            bson::doc! { "$set": {
                "fullname": &updated.fullname,
                "email": &updated.email,
                "address": &updated.address,
                "city": &updated.city,
                "country": &updated.country,
                "profile_picture": &updated.profile_picture,
                "updated_at": updated.updated_at,
            }},
        )
        .await?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Profile updated successfully.".to_string(),
        user: updated.into(),
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetAdminRequest {
    pub user_id: ObjectIdString,
    pub admin: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetAdminResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
}

/// Flips another user's admin flag. Admin only.
#[tracing::instrument(skip_all, fields(caller = %caller.id, target = %request.user_id.0))]
pub async fn set_admin(
    State(users): State<UserCollection>,
    caller: UserModel,
    Json(request): Json<SetAdminRequest>,
) -> Result<Json<SetAdminResponse>, Error> {
    if !caller.admin {
        return Err(Error::Forbidden);
    }

    let mut target = users
        .find_one_by_id(request.user_id.into())
        .await?
        .ok_or(Error::NotFound("user"))?;

    target.admin = request.admin;
    target.updated_at = OffsetDateTime::now_utc().into();

    users
        .update_one_by_id(
            target.id,
            bson::doc! { "$set": {
                "admin": target.admin,
                "updated_at": target.updated_at,
            }},
        )
        .await?;

    Ok(Json(SetAdminResponse {
        success: true,
        message: "Admin status updated.".to_string(),
        user: target.into(),
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserIndexResponse {
    pub success: bool,
    pub users: Vec<UserResponse>,
}

/// Lists all users. Admin only.
pub async fn index(
    State(users): State<UserCollection>,
    caller: UserModel,
) -> Result<Json<UserIndexResponse>, Error> {
    if !caller.admin {
        return Err(Error::Forbidden);
    }

    let mut cursor = users.find(None, None).await?;

    let mut result = vec![];
    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?.into());
    }

    Ok(Json(UserIndexResponse {
        success: true,
        users: result,
    }))
}

/// Looks up a single user. Admin only.
pub async fn show(
    State(users): State<UserCollection>,
    caller: UserModel,
    PathObjectId(id): PathObjectId,
) -> Result<Json<UserResponse>, Error> {
    if !caller.admin {
        return Err(Error::Forbidden);
    }

    let user = users
        .find_one_by_id(id)
        .await?
        .ok_or(Error::NotFound("user"))?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::Json;

    use crate::{api::v1::tests::bootstrap, error::Error};

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGODB_URI)"]
    async fn test_non_admin_cannot_manage_admin_flags() {
        let bootstrap = bootstrap().await;
        let customer = bootstrap.derive("customer@test.com", "password").await;

        let err = super::set_admin(
            bootstrap.user_collection(),
            customer.user_model.clone(),
            Json(super::SetAdminRequest {
                user_id: bootstrap.user_id().into(),
                admin: true,
            }),
        )
        .await
        .unwrap_err();
        assert_matches!(err, Error::Forbidden);

        let err = super::index(bootstrap.user_collection(), customer.user_model.clone())
            .await
            .unwrap_err();
        assert_matches!(err, Error::Forbidden);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGODB_URI)"]
    async fn test_admin_grants_and_revokes() {
        let bootstrap = bootstrap().await;
        let customer = bootstrap.derive("customer@test.com", "password").await;

        let Json(response) = super::set_admin(
            bootstrap.user_collection(),
            bootstrap.user_model.clone(),
            Json(super::SetAdminRequest {
                user_id: customer.user_id().into(),
                admin: true,
            }),
        )
        .await
        .unwrap();
        assert!(response.user.admin);

        let stored = bootstrap
            .app_state
            .user_collection
            .find_one_by_id(customer.user_id())
            .await
            .unwrap()
            .unwrap();
        assert!(stored.admin);
    }
}
