use axum::{
    extract::{Path, Query, State},
    Json,
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::{
    auth::UserAccess,
    menu::{MenuCollection, MenuResponse},
};

#[derive(Clone)]
pub struct RestaurantCollection(pub Collection<RestaurantModel>);

impl std::ops::Deref for RestaurantCollection {
    type Target = Collection<RestaurantModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestaurantModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Owning user.
    pub user_id: ObjectId,

    pub restaurant_name: String,
    pub city: String,
    pub country: String,
    /// Estimated delivery time in minutes.
    pub delivery_time: u32,
    pub cuisines: Vec<String>,

    /// Hosted image URL; uploading is the media service's problem.
    #[serde(default)]
    pub image_url: String,

    #[serde(default)]
    pub menus: Vec<ObjectId>,

    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestaurantResponse {
    pub id: ObjectIdString,
    pub user_id: ObjectIdString,

    pub restaurant_name: String,
    pub city: String,
    pub country: String,
    pub delivery_time: u32,
    pub cuisines: Vec<String>,
    pub image_url: String,

    pub created_at: FormattedDateTime,
    pub updated_at: FormattedDateTime,
}

impl From<RestaurantModel> for RestaurantResponse {
    fn from(value: RestaurantModel) -> Self {
        Self {
            id: value.id.into(),
            user_id: value.user_id.into(),

            restaurant_name: value.restaurant_name,
            city: value.city,
            country: value.country,
            delivery_time: value.delivery_time,
            cuisines: value.cuisines,
            image_url: value.image_url,

            created_at: value.created_at.into(),
            updated_at: value.updated_at.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestaurantDetailResponse {
    pub success: bool,
    pub restaurant: RestaurantResponse,
    pub menus: Vec<MenuResponse>,
}

async fn attach_menus(
    menus: &MenuCollection,
    restaurant: RestaurantModel,
) -> Result<RestaurantDetailResponse, Error> {
    let mut cursor = menus
        .find(bson::doc! { "_id": { "$in": &restaurant.menus } }, None)
        .await?;

    let mut result = vec![];
    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?.into());
    }

    Ok(RestaurantDetailResponse {
        success: true,
        restaurant: restaurant.into(),
        menus: result,
    })
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct CreateRestaurantRequest {
    #[validate(length(min = 1, max = 124))]
    pub restaurant_name: String,

    #[validate(length(min = 1))]
    pub city: String,

    #[validate(length(min = 1))]
    pub country: String,

    pub delivery_time: u32,

    pub cuisines: Vec<String>,

    #[serde(default)]
    pub image_url: String,
}

/// Creates the caller's restaurant. One per owner.
#[tracing::instrument(skip_all, fields(user = %user.id))]
pub async fn create(
    State(restaurants): State<RestaurantCollection>,
    user: UserAccess,
    Json(request): Json<CreateRestaurantRequest>,
) -> Result<Json<RestaurantDetailResponse>, Error> {
    request.validate()?;

    let count = restaurants
        .count_documents(bson::doc! { "user_id": user.id }, None)
        .await?;
    if count > 0 {
        return Err(Error::AlreadyExists("restaurant"))
            .tap_err(|_| tracing::debug!("tried creating a second restaurant"));
    }

    let model = RestaurantModel {
        id: ObjectId::new(),
        user_id: user.id,
        restaurant_name: request.restaurant_name,
        city: request.city,
        country: request.country,
        delivery_time: request.delivery_time,
        cuisines: request.cuisines,
        image_url: request.image_url,
        menus: vec![],
        created_at: OffsetDateTime::now_utc().into(),
        updated_at: OffsetDateTime::now_utc().into(),
    };

    restaurants.insert_one(&model, None).await?;

    Ok(Json(RestaurantDetailResponse {
        success: true,
        restaurant: model.into(),
        menus: vec![],
    }))
}

/// The caller's own restaurant, menus populated.
pub async fn show_own(
    State(restaurants): State<RestaurantCollection>,
    State(menus): State<MenuCollection>,
    user: UserAccess,
) -> Result<Json<RestaurantDetailResponse>, Error> {
    let restaurant = restaurants
        .find_one(bson::doc! { "user_id": user.id }, None)
        .await?
        .ok_or(Error::NotFound("restaurant"))?;

    Ok(Json(attach_menus(&menus, restaurant).await?))
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct UpdateRestaurantRequest {
    #[validate(length(min = 1, max = 124))]
    pub restaurant_name: String,

    #[validate(length(min = 1))]
    pub city: String,

    #[validate(length(min = 1))]
    pub country: String,

    pub delivery_time: u32,

    pub cuisines: Vec<String>,

    pub image_url: Option<String>,
}

#[tracing::instrument(skip_all, fields(user = %user.id))]
pub async fn update(
    State(restaurants): State<RestaurantCollection>,
    user: UserAccess,
    Json(request): Json<UpdateRestaurantRequest>,
) -> Result<Json<RestaurantDetailResponse>, Error> {
    request.validate()?;

    let restaurant = restaurants
        .find_one(bson::doc! { "user_id": user.id }, None)
        .await?
        .ok_or(Error::NotFound("restaurant"))
        .tap_err(|_| tracing::debug!("tried updating a restaurant that was never created"))?;

    let restaurant = RestaurantModel {
        restaurant_name: request.restaurant_name,
        city: request.city,
        country: request.country,
        delivery_time: request.delivery_time,
        cuisines: request.cuisines,
        image_url: request.image_url.unwrap_or(restaurant.image_url),
        updated_at: OffsetDateTime::now_utc().into(),
        ..restaurant
    };

    restaurants
        .update_one_by_id(
            restaurant.id,
            bson::doc! { "$set": {
                "restaurant_name": &restaurant.restaurant_name,
                "city": &restaurant.city,
                "country": &restaurant.country,
                "delivery_time": restaurant.delivery_time,
                "cuisines": bson::to_bson(&restaurant.cuisines)?,
                "image_url": &restaurant.image_url,
                "updated_at": restaurant.updated_at,
            }},
        )
        .await?;

    Ok(Json(RestaurantDetailResponse {
        success: true,
        restaurant: restaurant.into(),
        menus: vec![],
    }))
}

/// Public restaurant detail, menus populated.
pub async fn show(
    State(restaurants): State<RestaurantCollection>,
    State(menus): State<MenuCollection>,
    PathObjectId(id): PathObjectId,
) -> Result<Json<RestaurantDetailResponse>, Error> {
    let restaurant = restaurants
        .find_one_by_id(id)
        .await?
        .ok_or(Error::NotFound("restaurant"))?;

    Ok(Json(attach_menus(&menus, restaurant).await?))
}

#[derive(Deserialize, Debug, Default)]
pub struct SearchQuery {
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub selected_cuisines: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchResponse {
    pub success: bool,
    pub data: Vec<RestaurantResponse>,
}

/// Case-insensitive text search over name/city/country plus cuisine filter.
pub async fn search(
    State(restaurants): State<RestaurantCollection>,
    search_text: Option<Path<String>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, Error> {
    let mut filter = bson::Document::new();
    let mut or = vec![];

    if let Some(Path(text)) = search_text.filter(|Path(text)| !text.is_empty()) {
        for field in ["restaurant_name", "city", "country"] {
            or.push(bson::doc! { field: { "$regex": &text, "$options": "i" } });
        }
    }

    if !query.search_query.is_empty() {
        for field in ["restaurant_name", "cuisines"] {
            or.push(bson::doc! { field: { "$regex": &query.search_query, "$options": "i" } });
        }
    }

    if !or.is_empty() {
        filter.insert("$or", or);
    }

    let cuisines = query
        .selected_cuisines
        .split(',')
        .filter(|cuisine| !cuisine.is_empty())
        .collect::<Vec<_>>();
    if !cuisines.is_empty() {
        filter.insert("cuisines", bson::doc! { "$in": cuisines });
    }

    let mut cursor = restaurants.find(filter, None).await?;

    let mut data = vec![];
    while cursor.advance().await? {
        data.push(cursor.deserialize_current()?.into());
    }

    Ok(Json(SearchResponse {
        success: true,
        data,
    }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::Json;

    use crate::{api::v1::tests::bootstrap, error::Error};

    use super::CreateRestaurantRequest;

    fn create_request(name: &str) -> CreateRestaurantRequest {
        CreateRestaurantRequest {
            restaurant_name: name.to_string(),
            city: "Pune".to_string(),
            country: "India".to_string(),
            delivery_time: 30,
            cuisines: vec!["Italian".to_string()],
            image_url: String::new(),
        }
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGODB_URI)"]
    async fn test_owner_gets_one_restaurant() {
        let bootstrap = bootstrap().await;

        let Json(created) = super::create(
            bootstrap.restaurant_collection(),
            bootstrap.user_access(),
            Json(create_request("Trattoria")),
        )
        .await
        .unwrap();
        assert_eq!(created.restaurant.restaurant_name, "Trattoria");

        let err = super::create(
            bootstrap.restaurant_collection(),
            bootstrap.user_access(),
            Json(create_request("Second")),
        )
        .await
        .unwrap_err();
        assert_matches!(err, Error::AlreadyExists("restaurant"));
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGODB_URI)"]
    async fn test_search_matches_name_and_cuisine() {
        let bootstrap = bootstrap().await;

        let _ = super::create(
            bootstrap.restaurant_collection(),
            bootstrap.user_access(),
            Json(create_request("Trattoria Roma")),
        )
        .await
        .unwrap();

        let Json(by_name) = super::search(
            bootstrap.restaurant_collection(),
            Some(axum::extract::Path("roma".to_string())),
            axum::extract::Query(Default::default()),
        )
        .await
        .unwrap();
        assert_eq!(by_name.data.len(), 1);

        let Json(by_cuisine) = super::search(
            bootstrap.restaurant_collection(),
            None,
            axum::extract::Query(super::SearchQuery {
                search_query: String::new(),
                selected_cuisines: "Italian,Thai".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(by_cuisine.data.len(), 1);

        let Json(no_match) = super::search(
            bootstrap.restaurant_collection(),
            Some(axum::extract::Path("sushi".to_string())),
            axum::extract::Query(Default::default()),
        )
        .await
        .unwrap();
        assert!(no_match.data.is_empty());
    }
}
