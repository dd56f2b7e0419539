use std::collections::HashMap;

use axum::{extract::State, Json};
use bson::oid::ObjectId;
use mongodb::options::FindOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    checkout::{CheckoutItem, CheckoutSessionRequest, DeliveryDetails},
    error::Error,
    gateway::{to_minor_units, GatewayOrder, PaymentGateway, CURRENCY},
    mongo_ext::Collection,
    util::{DecimalString, FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::{
    auth::{MessageResponse, UserAccess, UserCollection},
    restaurant::RestaurantCollection,
};

#[derive(Clone)]
pub struct OrderCollection(pub Collection<OrderModel>);

impl std::ops::Deref for OrderCollection {
    type Target = Collection<OrderModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Lifecycle of an order. Serialized in lowercase with no separators, so
/// `OutForDelivery` travels as `"outfordelivery"`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
}

/// A cart line frozen into the order at checkout time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub menu_id: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl From<CheckoutItem> for OrderItem {
    fn from(value: CheckoutItem) -> Self {
        Self {
            menu_id: value.menu_id,
            name: value.name,
            image: value.image,
            price: value.price.into(),
            quantity: value.quantity.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub restaurant_id: ObjectId,

    pub delivery_details: DeliveryDetails,
    pub cart_items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,

    /// Gateway payment id, set once the payment is verified.
    pub payment_id: Option<String>,

    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderResponse {
    pub id: ObjectIdString,
    pub user_id: ObjectIdString,
    pub restaurant_id: ObjectIdString,

    pub delivery_details: DeliveryDetails,
    pub cart_items: Vec<OrderItem>,
    pub total_amount: DecimalString,
    pub status: OrderStatus,

    pub payment_id: Option<String>,

    pub created_at: FormattedDateTime,
    pub updated_at: FormattedDateTime,
}

impl From<OrderModel> for OrderResponse {
    fn from(value: OrderModel) -> Self {
        Self {
            id: value.id.into(),
            user_id: value.user_id.into(),
            restaurant_id: value.restaurant_id.into(),

            delivery_details: value.delivery_details,
            cart_items: value.cart_items,
            total_amount: value.total_amount.into(),
            status: value.status,

            payment_id: value.payment_id,

            created_at: value.created_at.into(),
            updated_at: value.updated_at.into(),
        }
    }
}

/// Sum of price times quantity over the submitted cart lines. Prices arrive
/// through the string-or-number coercion, so the arithmetic here is exact
/// decimal, never float.
pub fn compute_total(items: &[CheckoutItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.price.0 * Decimal::from(item.quantity.0))
        .sum()
}

/// Everything the client needs to open the payment widget: the gateway
/// order object verbatim, the key id, and prefill details. The persisted
/// internal order rides along under its own key.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CheckoutSessionResponse {
    pub success: bool,
    pub order: GatewayOrder,
    pub pending_order: OrderResponse,

    pub key_id: String,
    pub order_id: String,
    pub amount: i64,
    pub currency: String,

    pub name: String,
    pub description: String,

    pub customer_name: String,
    pub customer_email: String,
    pub customer_contact: String,
}

/// Persists a pending order and opens a matching gateway order. The order
/// stays pending until its payment is verified.
#[tracing::instrument(skip_all, fields(user = %user.id))]
pub async fn create_checkout_session(
    State(orders): State<OrderCollection>,
    State(restaurants): State<RestaurantCollection>,
    State(gateway): State<PaymentGateway>,
    user: UserAccess,
    Json(request): Json<CheckoutSessionRequest>,
) -> Result<Json<CheckoutSessionResponse>, Error> {
    let restaurant = restaurants
        .find_one_by_id(request.restaurant_id.into())
        .await?
        .ok_or(Error::NotFound("restaurant"))?;

    if request.cart_items.is_empty() {
        return Err(Error::EmptyCart)
            .tap_err(|_| tracing::debug!("tried checking out an empty cart"));
    }
    request.delivery_details.validate()?;

    let total_amount = compute_total(&request.cart_items);

    let order = OrderModel {
        id: ObjectId::new(),
        user_id: user.id,
        restaurant_id: restaurant.id,
        delivery_details: request.delivery_details,
        cart_items: request.cart_items.into_iter().map(Into::into).collect(),
        total_amount,
        status: OrderStatus::Pending,
        payment_id: None,
        created_at: OffsetDateTime::now_utc().into(),
        updated_at: OffsetDateTime::now_utc().into(),
    };
    orders.insert_one(&order, None).await?;

    let amount = to_minor_units(total_amount)?;
    let gateway_order = gateway.create_order(amount, &order.id.to_hex()).await?;

    let description = format!("Order from {}", restaurant.restaurant_name);
    let customer = &order.delivery_details;

    Ok(Json(CheckoutSessionResponse {
        success: true,

        key_id: gateway.key_id().to_string(),
        order_id: gateway_order.id.clone(),
        amount: gateway_order.amount,
        currency: CURRENCY.to_string(),

        name: restaurant.restaurant_name,
        description,

        customer_name: customer.name.clone(),
        customer_email: customer.email.clone(),
        customer_contact: customer.contact.clone(),

        order: gateway_order,
        pending_order: order.into(),
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
    pub order_id: ObjectIdString,
}

/// Confirms a pending order once the gateway callback signature checks out.
/// A bad signature leaves the order untouched.
#[tracing::instrument(skip_all, fields(user = %user.id, order = %request.order_id.0))]
pub async fn verify_payment(
    State(orders): State<OrderCollection>,
    State(gateway): State<PaymentGateway>,
    user: UserAccess,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<MessageResponse>, Error> {
    let valid = gateway.verify_signature(
        &request.razorpay_order_id,
        &request.razorpay_payment_id,
        &request.razorpay_signature,
    );
    if !valid {
        return Err(Error::InvalidPaymentSignature)
            .tap_err(|_| tracing::warn!("payment signature mismatch"));
    }

    let order = orders
        .find_one_by_id(request.order_id.into())
        .await?
        .ok_or(Error::NotFound("order"))?;

    orders
        .update_one_by_id(
            order.id,
            bson::doc! { "$set": {
                "status": bson::to_bson(&OrderStatus::Confirmed)?,
                "payment_id": &request.razorpay_payment_id,
                "updated_at": bson::DateTime::from(OffsetDateTime::now_utc()),
            }},
        )
        .await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Payment verified successfully.".to_string(),
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestaurantSummary {
    pub id: ObjectIdString,
    pub restaurant_name: String,
    pub city: String,
    pub image_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserOrder {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub restaurant: Option<RestaurantSummary>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserOrderIndexResponse {
    pub success: bool,
    pub orders: Vec<UserOrder>,
}

fn newest_first() -> FindOptions {
    FindOptions::builder()
        .sort(bson::doc! { "created_at": -1 })
        .build()
}

/// The caller's orders, newest first, with a summary of each restaurant.
pub async fn index(
    State(orders): State<OrderCollection>,
    State(restaurants): State<RestaurantCollection>,
    user: UserAccess,
) -> Result<Json<UserOrderIndexResponse>, Error> {
    let mut cursor = orders
        .find(bson::doc! { "user_id": user.id }, newest_first())
        .await?;

    let mut result: Vec<OrderModel> = vec![];
    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?);
    }

    let restaurant_ids = result
        .iter()
        .map(|order| order.restaurant_id)
        .collect::<Vec<_>>();
    let mut cursor = restaurants
        .find(bson::doc! { "_id": { "$in": restaurant_ids } }, None)
        .await?;

    let mut summaries = HashMap::new();
    while cursor.advance().await? {
        let restaurant = cursor.deserialize_current()?;
        summaries.insert(
            restaurant.id,
            RestaurantSummary {
                id: restaurant.id.into(),
                restaurant_name: restaurant.restaurant_name,
                city: restaurant.city,
                image_url: restaurant.image_url,
            },
        );
    }

    let orders = result
        .into_iter()
        .map(|order| UserOrder {
            restaurant: summaries.get(&order.restaurant_id).cloned(),
            order: order.into(),
        })
        .collect();

    Ok(Json(UserOrderIndexResponse {
        success: true,
        orders,
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderCustomer {
    pub id: ObjectIdString,
    pub fullname: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestaurantOrder {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub user: Option<OrderCustomer>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestaurantOrderIndexResponse {
    pub success: bool,
    pub orders: Vec<RestaurantOrder>,
}

/// Orders placed at the caller's restaurant, newest first, with the
/// ordering customer attached.
pub async fn index_restaurant_orders(
    State(orders): State<OrderCollection>,
    State(restaurants): State<RestaurantCollection>,
    State(users): State<UserCollection>,
    user: UserAccess,
) -> Result<Json<RestaurantOrderIndexResponse>, Error> {
    let restaurant = restaurants
        .find_one(bson::doc! { "user_id": user.id }, None)
        .await?
        .ok_or(Error::NotFound("restaurant"))?;

    let mut cursor = orders
        .find(
            bson::doc! { "restaurant_id": restaurant.id },
            newest_first(),
        )
        .await?;

    let mut result: Vec<OrderModel> = vec![];
    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?);
    }

    let user_ids = result.iter().map(|order| order.user_id).collect::<Vec<_>>();
    let mut cursor = users
        .find(bson::doc! { "_id": { "$in": user_ids } }, None)
        .await?;

    let mut customers = HashMap::new();
    while cursor.advance().await? {
        let customer = cursor.deserialize_current()?;
        customers.insert(
            customer.id,
            OrderCustomer {
                id: customer.id.into(),
                fullname: customer.fullname,
            },
        );
    }

    let orders = result
        .into_iter()
        .map(|order| RestaurantOrder {
            user: customers.get(&order.user_id).cloned(),
            order: order.into(),
        })
        .collect();

    Ok(Json(RestaurantOrderIndexResponse {
        success: true,
        orders,
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub message: String,
    pub status: OrderStatus,
}

/// Moves an order to a new status. Only the restaurant that received the
/// order may touch it; the target status itself is not gated, so a kitchen
/// can also walk an order backwards after a mistake.
#[tracing::instrument(skip_all, fields(user = %user.id, order = %order_id))]
pub async fn update_status(
    State(orders): State<OrderCollection>,
    State(restaurants): State<RestaurantCollection>,
    user: UserAccess,
    PathObjectId(order_id): PathObjectId,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, Error> {
    let order = orders
        .find_one_by_id(order_id)
        .await?
        .ok_or(Error::NotFound("order"))?;

    let restaurant = restaurants
        .find_one_by_id(order.restaurant_id)
        .await?
        .ok_or(Error::NotFound("restaurant"))?;

    if restaurant.user_id != user.id {
        return Err(Error::Forbidden)
            .tap_err(|_| tracing::debug!("tried updating another restaurant's order"));
    }

    orders
        .update_one_by_id(
            order.id,
            bson::doc! { "$set": {
                "status": bson::to_bson(&request.status)?,
                "updated_at": bson::DateTime::from(OffsetDateTime::now_utc()),
            }},
        )
        .await?;

    Ok(Json(UpdateStatusResponse {
        success: true,
        message: "Order status updated.".to_string(),
        status: request.status,
    }))
}

/// Deletes one of the caller's own orders.
#[tracing::instrument(skip_all, fields(user = %user.id, order = %order_id))]
pub async fn delete(
    State(orders): State<OrderCollection>,
    user: UserAccess,
    PathObjectId(order_id): PathObjectId,
) -> Result<Json<MessageResponse>, Error> {
    let order = orders
        .find_one_by_id(order_id)
        .await?
        .ok_or(Error::NotFound("order"))?;

    if order.user_id != user.id {
        return Err(Error::Forbidden)
            .tap_err(|_| tracing::debug!("tried deleting another user's order"));
    }

    orders.delete_one_by_id(order.id).await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Order deleted successfully.".to_string(),
    }))
}
