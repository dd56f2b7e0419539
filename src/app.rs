use argon2::Argon2;
use axum::{
    extract::FromRef,
    routing::{delete, get, post, put},
    Router,
};
use mongodb::Client;

use crate::{
    api::v1::{
        auth::{self, UserCollection},
        menu::{self, MenuCollection},
        order::{self, OrderCollection},
        restaurant::{self, RestaurantCollection},
        token::JwtState,
        user,
    },
    gateway::PaymentGateway,
};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub argon: Argon2<'static>,
    pub jwt_state: JwtState,
    pub gateway: PaymentGateway,

    pub mongo_client: Client,

    pub user_collection: UserCollection,
    pub restaurant_collection: RestaurantCollection,
    pub menu_collection: MenuCollection,
    pub order_collection: OrderCollection,
}

impl AppState {
    pub async fn new(
        mongo_url: &str,
        database_name: &str,
        jwt_state: JwtState,
        gateway: PaymentGateway,
    ) -> Result<Self, anyhow::Error> {
        let mongo_client = Client::with_uri_str(mongo_url).await?;
        let database = mongo_client.database(database_name);

        Ok(Self {
            argon: Argon2::default(),
            jwt_state,
            gateway,

            user_collection: UserCollection(database.collection("users").into()),
            restaurant_collection: RestaurantCollection(database.collection("restaurants").into()),
            menu_collection: MenuCollection(database.collection("menus").into()),
            order_collection: OrderCollection(database.collection("orders").into()),

            mongo_client,
        })
    }

    pub async fn new_from_env() -> Result<Self, anyhow::Error> {
        let mongo_url = std::env::var("MONGODB_URI")
            .map_err(|_| anyhow::anyhow!("Cannot retrieve MONGODB_URI from environment variable."))?;
        let database_name =
            std::env::var("DATABASE_NAME").unwrap_or_else(|_| "eatery".to_string());

        Self::new(
            &mongo_url,
            &database_name,
            JwtState::new_from_env(),
            PaymentGateway::new_from_env(),
        )
        .await
    }
}

pub fn router(state: AppState) -> Router {
    let user = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/check-auth", get(auth::check_auth))
        .route("/profile/update", put(user::update_profile))
        .route("/set-admin", post(user::set_admin))
        .route("/", get(user::index))
        .route("/:id", get(user::show));

    let restaurant = Router::new()
        .route("/", post(restaurant::create).get(restaurant::show_own).put(restaurant::update))
        .route("/search-restaurants", get(restaurant::search))
        .route("/search-restaurants/:searchText", get(restaurant::search))
        .route("/order", get(order::index_restaurant_orders))
        .route("/order/:orderId/status", put(order::update_status))
        .route("/:id", get(restaurant::show));

    let menu = Router::new()
        .route("/", post(menu::add).get(menu::index))
        .route("/:id", put(menu::edit).delete(menu::delete));

    let order = Router::new()
        .route("/", get(order::index))
        .route("/checkout/create-checkout-session", post(order::create_checkout_session))
        .route("/payment/verify", post(order::verify_payment))
        .route("/:id", delete(order::delete));

    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .nest("/user", user)
                .nest("/restaurant", restaurant)
                .nest("/menu", menu)
                .nest("/order", order),
        )
        .with_state(state)
}
