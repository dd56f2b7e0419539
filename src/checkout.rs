use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    cart::CartStore,
    error::Error,
    util::{DecimalString, ObjectIdString, QuantityString},
};

/// Where and to whom the order ships. Every field is required at checkout;
/// contact must be a 10-digit number.
#[derive(Validate, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeliveryDetails {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(custom = "validate_contact")]
    pub contact: String,

    #[validate(length(min = 1))]
    pub address: String,

    #[validate(length(min = 1))]
    pub city: String,

    #[validate(length(min = 1))]
    pub country: String,
}

pub fn validate_contact(contact: &str) -> Result<(), ValidationError> {
    if contact.len() == 10 && contact.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("contact must be a 10-digit number"))
    }
}

/// One cart line as submitted to the server. Price and quantity travel as
/// strings but deserialize from plain numbers too.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CheckoutItem {
    pub menu_id: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub price: DecimalString,
    pub quantity: QuantityString,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub cart_items: Vec<CheckoutItem>,
    pub delivery_details: DeliveryDetails,
    pub restaurant_id: ObjectIdString,
}

impl CheckoutSessionRequest {
    /// Builds the checkout request from the current cart and delivery
    /// details, failing fast before any server round trip: the cart must be
    /// non-empty and the delivery details complete.
    pub fn build(cart: &CartStore, delivery_details: DeliveryDetails) -> Result<Self, Error> {
        let restaurant_id = match cart.restaurant_id() {
            Some(id) if !cart.is_empty() => id,
            _ => return Err(Error::EmptyCart),
        };

        delivery_details.validate()?;

        let cart_items = cart
            .items()
            .iter()
            .map(|line| CheckoutItem {
                menu_id: line.item.id.clone(),
                name: line.item.name.clone(),
                image: line.item.image.clone(),
                price: line.item.price.into(),
                quantity: line.quantity.into(),
            })
            .collect();

        Ok(Self {
            cart_items,
            delivery_details,
            restaurant_id: restaurant_id.into(),
        })
    }
}
