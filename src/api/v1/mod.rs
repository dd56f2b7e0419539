pub mod auth;
pub mod menu;
pub mod order;
pub mod restaurant;
pub mod token;
pub mod user;

#[cfg(test)]
pub mod tests {
    use argon2::Argon2;
    use axum::{extract::State, Json};
    use bson::oid::ObjectId;

    use crate::{
        app::AppState,
        gateway::PaymentGateway,
    };

    use super::{
        auth::{create_user, SignupRequest, UserAccess, UserCollection, UserModel},
        menu::MenuCollection,
        order::OrderCollection,
        restaurant::{self, CreateRestaurantRequest, RestaurantCollection, RestaurantModel},
        token::{generate_token, JwtState},
    };

    /// Handler test fixture: an app state bound to a throwaway database plus
    /// one signed-up admin user to act as.
    pub struct Bootstrap {
        pub app_state: AppState,
        pub user_model: UserModel,
    }

    impl Bootstrap {
        pub const GATEWAY_SECRET: &'static str = "secret";

        pub fn user_id(&self) -> ObjectId {
            self.user_model.id
        }

        pub fn user_access(&self) -> UserAccess {
            UserAccess {
                id: self.user_model.id,
            }
        }

        pub fn user_token(&self) -> String {
            generate_token(&self.app_state.jwt_state, &self.user_model)
                .unwrap()
                .token
        }

        pub fn user_collection(&self) -> State<UserCollection> {
            State(self.app_state.user_collection.clone())
        }

        pub fn restaurant_collection(&self) -> State<RestaurantCollection> {
            State(self.app_state.restaurant_collection.clone())
        }

        pub fn menu_collection(&self) -> State<MenuCollection> {
            State(self.app_state.menu_collection.clone())
        }

        pub fn order_collection(&self) -> State<OrderCollection> {
            State(self.app_state.order_collection.clone())
        }

        pub fn jwt_state(&self) -> State<JwtState> {
            State(self.app_state.jwt_state.clone())
        }

        pub fn argon(&self) -> State<Argon2<'static>> {
            State(self.app_state.argon.clone())
        }

        pub fn gateway(&self) -> State<PaymentGateway> {
            State(self.app_state.gateway.clone())
        }

        /// Signs up another (non-admin) user against the same database.
        pub async fn derive(&self, email: &str, password: &str) -> Bootstrap {
            let user_model = create_user(
                &self.app_state.user_collection,
                &self.app_state.argon,
                signup_request(email, password),
            )
            .await
            .unwrap();

            Bootstrap {
                app_state: self.app_state.clone(),
                user_model,
            }
        }

        /// Creates this user's restaurant and returns the stored model.
        pub async fn create_restaurant(&self, name: &str) -> RestaurantModel {
            let Json(response) = restaurant::create(
                self.restaurant_collection(),
                self.user_access(),
                Json(CreateRestaurantRequest {
                    restaurant_name: name.to_string(),
                    city: "Pune".to_string(),
                    country: "India".to_string(),
                    delivery_time: 30,
                    cuisines: vec!["Italian".to_string()],
                    image_url: String::new(),
                }),
            )
            .await
            .unwrap();

            self.app_state
                .restaurant_collection
                .find_one_by_id(response.restaurant.id.0)
                .await
                .unwrap()
                .unwrap()
        }
    }

    fn signup_request(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            fullname: "name".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            contact: "9876543210".to_string(),
        }
    }

    pub async fn bootstrap() -> Bootstrap {
        let _ = dotenvy::dotenv();

        let mongo_url = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let database_name = format!("eatery-test-{}", ObjectId::new());

        let app_state = AppState::new(
            &mongo_url,
            &database_name,
            JwtState::new(b"test-secret"),
            PaymentGateway::new("rzp_test_key", Bootstrap::GATEWAY_SECRET),
        )
        .await
        .unwrap();

        let mut user_model = create_user(
            &app_state.user_collection,
            &app_state.argon,
            signup_request("owner@test.com", "password"),
        )
        .await
        .unwrap();

        app_state
            .user_collection
            .update_one_by_id(user_model.id, bson::doc! { "$set": { "admin": true } })
            .await
            .unwrap();
        user_model.admin = true;

        Bootstrap {
            app_state,
            user_model,
        }
    }
}
