use axum::{extract::State, Json};
use bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{DecimalString, FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::{
    auth::{MessageResponse, UserAccess},
    restaurant::RestaurantCollection,
};

#[derive(Clone)]
pub struct MenuCollection(pub Collection<MenuModel>);

impl std::ops::Deref for MenuCollection {
    type Target = Collection<MenuModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MenuModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,

    #[serde(default)]
    pub image: String,

    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MenuResponse {
    pub id: ObjectIdString,

    pub name: String,
    pub description: String,
    pub price: DecimalString,
    pub category: String,
    pub image: String,

    pub created_at: FormattedDateTime,
    pub updated_at: FormattedDateTime,
}

impl From<MenuModel> for MenuResponse {
    fn from(value: MenuModel) -> Self {
        Self {
            id: value.id.into(),
            name: value.name,
            description: value.description,
            price: value.price.into(),
            category: value.category,
            image: value.image,
            created_at: value.created_at.into(),
            updated_at: value.updated_at.into(),
        }
    }
}

fn default_category() -> String {
    "Main Course".to_string()
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct AddMenuRequest {
    #[validate(length(min = 1, max = 124))]
    pub name: String,

    pub description: String,

    pub price: DecimalString,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub image: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MenuMutationResponse {
    pub success: bool,
    pub message: String,
    pub menu: MenuResponse,
}

/// Adds a menu item and links it to the caller's restaurant.
#[tracing::instrument(skip_all, fields(user = %user.id))]
pub async fn add(
    State(menus): State<MenuCollection>,
    State(restaurants): State<RestaurantCollection>,
    user: UserAccess,
    Json(request): Json<AddMenuRequest>,
) -> Result<Json<MenuMutationResponse>, Error> {
    request.validate()?;

    if request.price.0 < Decimal::ZERO {
        return Err(Error::ValidationError(negative_price_error()))
            .tap_err(|_| tracing::debug!("tried creating a menu with a negative price"));
    }

    let restaurant = restaurants
        .find_one(bson::doc! { "user_id": user.id }, None)
        .await?
        .ok_or(Error::NotFound("restaurant"))
        .tap_err(|_| tracing::debug!("tried adding a menu without a restaurant"))?;

    let model = MenuModel {
        id: ObjectId::new(),
        name: request.name,
        description: request.description,
        price: request.price.into(),
        category: request.category,
        image: request.image,
        created_at: OffsetDateTime::now_utc().into(),
        updated_at: OffsetDateTime::now_utc().into(),
    };

    menus.insert_one(&model, None).await?;
    restaurants
        .update_one_by_id(restaurant.id, bson::doc! { "$push": { "menus": model.id } })
        .await?;

    Ok(Json(MenuMutationResponse {
        success: true,
        message: "Menu added successfully.".to_string(),
        menu: model.into(),
    }))
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct EditMenuRequest {
    #[validate(length(min = 1, max = 124))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<DecimalString>,
    pub category: Option<String>,
    pub image: Option<String>,
}

/// Edits a menu item owned by the caller's restaurant; absent fields keep
/// their stored values.
#[tracing::instrument(skip_all, fields(user = %user.id, menu = %menu_id))]
pub async fn edit(
    State(menus): State<MenuCollection>,
    State(restaurants): State<RestaurantCollection>,
    user: UserAccess,
    PathObjectId(menu_id): PathObjectId,
    Json(request): Json<EditMenuRequest>,
) -> Result<Json<MenuMutationResponse>, Error> {
    request.validate()?;

    if matches!(request.price, Some(price) if price.0 < Decimal::ZERO) {
        return Err(Error::ValidationError(negative_price_error()));
    }

    let restaurant = restaurants
        .find_one(bson::doc! { "user_id": user.id }, None)
        .await?
        .ok_or(Error::NotFound("restaurant"))?;

    if !restaurant.menus.contains(&menu_id) {
        return Err(Error::Forbidden)
            .tap_err(|_| tracing::debug!("tried editing another restaurant's menu"));
    }

    let menu = menus
        .find_one_by_id(menu_id)
        .await?
        .ok_or(Error::NotFound("menu"))?;

    let menu = MenuModel {
        name: request.name.unwrap_or(menu.name),
        description: request.description.unwrap_or(menu.description),
        price: request.price.map(Into::into).unwrap_or(menu.price),
        category: request.category.unwrap_or(menu.category),
        image: request.image.unwrap_or(menu.image),
        updated_at: OffsetDateTime::now_utc().into(),
        ..menu
    };

    menus
        .update_one_by_id(menu.id, bson::doc! { "$set": bson::to_document(&menu)? })
        .await?;

    Ok(Json(MenuMutationResponse {
        success: true,
        message: "Menu updated.".to_string(),
        menu: menu.into(),
    }))
}

/// Deletes a menu item owned by the caller's restaurant and unlinks it.
#[tracing::instrument(skip_all, fields(user = %user.id, menu = %menu_id))]
pub async fn delete(
    State(menus): State<MenuCollection>,
    State(restaurants): State<RestaurantCollection>,
    user: UserAccess,
    PathObjectId(menu_id): PathObjectId,
) -> Result<Json<MessageResponse>, Error> {
    let restaurant = restaurants
        .find_one(bson::doc! { "user_id": user.id }, None)
        .await?
        .ok_or(Error::NotFound("restaurant"))?;

    if !restaurant.menus.contains(&menu_id) {
        return Err(Error::Forbidden)
            .tap_err(|_| tracing::debug!("tried deleting another restaurant's menu"));
    }

    let menu = menus
        .find_one_by_id(menu_id)
        .await?
        .ok_or(Error::NotFound("menu"))?;

    menus.delete_one_by_id(menu.id).await?;
    restaurants
        .update_one_by_id(restaurant.id, bson::doc! { "$pull": { "menus": menu.id } })
        .await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Menu deleted successfully.".to_string(),
    }))
}

fn negative_price_error() -> validator::ValidationErrors {
    let mut errors = validator::ValidationErrors::new();
    errors.add("price", validator::ValidationError::new("price must not be negative"));
    errors
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MenuIndexResponse {
    pub success: bool,
    pub menus: Vec<MenuResponse>,
}

/// Lists the caller's restaurant menu.
pub async fn index(
    State(menus): State<MenuCollection>,
    State(restaurants): State<RestaurantCollection>,
    user: UserAccess,
) -> Result<Json<MenuIndexResponse>, Error> {
    let restaurant = restaurants
        .find_one(bson::doc! { "user_id": user.id }, None)
        .await?
        .ok_or(Error::NotFound("restaurant"))?;

    let mut cursor = menus
        .find(bson::doc! { "_id": { "$in": &restaurant.menus } }, None)
        .await?;

    let mut result = vec![];
    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?.into());
    }

    Ok(Json(MenuIndexResponse {
        success: true,
        menus: result,
    }))
}
