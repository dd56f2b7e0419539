use hmac::{Hmac, Mac};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

pub const CURRENCY: &str = "INR";

/// Order object as returned by the payment gateway. Passed through to the
/// client verbatim so it can initialize the payment widget.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GatewayOrder {
    pub id: String,
    pub entity: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Serialize, Debug)]
struct CreateOrderPayload<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// Razorpay-shaped payment gateway client. Creates gateway orders over REST
/// and checks callback signatures with the shared key secret.
#[derive(Clone)]
pub struct PaymentGateway {
    key_id: String,
    key_secret: String,
    base_url: String,
    http: reqwest::Client,
}

impl PaymentGateway {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            base_url: "https://api.razorpay.com".to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn new_from_env() -> Self {
        let key_id = std::env::var("RAZORPAY_KEY_ID")
            .expect("Cannot retrieve RAZORPAY_KEY_ID from environment variable.");
        let key_secret = std::env::var("RAZORPAY_KEY_SECRET")
            .expect("Cannot retrieve RAZORPAY_KEY_SECRET from environment variable.");

        Self::new(key_id, key_secret)
    }

    /// Public key id, safe to hand to clients.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Opens a gateway order for `amount` minor currency units, tagged with
    /// the internal order id as receipt.
    pub async fn create_order(&self, amount: i64, receipt: &str) -> Result<GatewayOrder, Error> {
        let payload = CreateOrderPayload {
            amount,
            currency: CURRENCY,
            receipt,
        };

        let order = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json::<GatewayOrder>()
            .await?;

        Ok(order)
    }

    /// Checks a callback signature: HMAC-SHA256 over
    /// `"{gateway_order_id}|{payment_id}"` keyed with the key secret,
    /// hex-encoded. Comparison is constant-time via `Mac::verify_slice`.
    pub fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let supplied = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let mut mac = match HmacSha256::new_from_slice(self.key_secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());

        mac.verify_slice(&supplied).is_ok()
    }
}

/// Converts a decimal amount to the gateway's integer minor currency units
/// (paise), rounding to the nearest unit.
pub fn to_minor_units(amount: Decimal) -> Result<i64, Error> {
    amount
        .checked_mul(Decimal::from(100))
        .and_then(|minor| minor.round().to_i64())
        .ok_or_else(|| Error::Internal(anyhow::anyhow!("amount out of range: {amount}")))
}

#[cfg(test)]
mod tests {
    use hmac::{Hmac, Mac};
    use rust_decimal::Decimal;
    use sha2::Sha256;

    use super::{to_minor_units, PaymentGateway};

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_correct_signature() {
        let gateway = PaymentGateway::new("rzp_test_key", "secret");
        let signature = sign("secret", "order_abc", "pay_xyz");

        assert!(gateway.verify_signature("order_abc", "pay_xyz", &signature));
    }

    #[test]
    fn rejects_a_forged_signature() {
        let gateway = PaymentGateway::new("rzp_test_key", "secret");

        let forged = sign("wrong-secret", "order_abc", "pay_xyz");
        assert!(!gateway.verify_signature("order_abc", "pay_xyz", &forged));

        let for_other_payment = sign("secret", "order_abc", "pay_other");
        assert!(!gateway.verify_signature("order_abc", "pay_xyz", &for_other_payment));

        assert!(!gateway.verify_signature("order_abc", "pay_xyz", "not hex"));
        assert!(!gateway.verify_signature("order_abc", "pay_xyz", ""));
    }

    #[test]
    fn converts_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::from(20)).unwrap(), 2000);
        assert_eq!(to_minor_units(Decimal::new(1999, 2)).unwrap(), 1999);
        assert_eq!(to_minor_units(Decimal::new(10005, 3)).unwrap(), 1000);
        assert!(to_minor_units(Decimal::MAX).is_err());
    }
}
