use std::str::FromStr;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
    RequestPartsExt,
};
use bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;

/// ObjectId that serializes as its hex string instead of bson's
/// `{"$oid": ...}` shape, for use in JSON request/response bodies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ObjectIdString(#[serde(with = "object_id_string")] pub ObjectId);

impl From<ObjectId> for ObjectIdString {
    fn from(value: ObjectId) -> Self {
        Self(value)
    }
}

impl From<ObjectIdString> for ObjectId {
    fn from(value: ObjectIdString) -> Self {
        value.0
    }
}

impl std::ops::Deref for ObjectIdString {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::cmp::PartialEq for ObjectIdString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl std::cmp::Eq for ObjectIdString {}

impl std::cmp::PartialEq<ObjectId> for ObjectIdString {
    fn eq(&self, other: &ObjectId) -> bool {
        self.0 == *other
    }
}

impl From<ObjectIdString> for bson::Bson {
    fn from(value: ObjectIdString) -> Self {
        value.0.into()
    }
}

mod object_id_string {
    use bson::oid::ObjectId;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&id.to_hex())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ObjectId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Path segment that must be a well-formed ObjectId. A malformed id is a
/// client error (400), not a missing resource.
#[derive(Debug, Clone, Copy)]
pub struct PathObjectId(pub ObjectId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for PathObjectId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = parts
            .extract::<Path<String>>()
            .await
            .map_err(|_| Error::InvalidObjectId)?;

        ObjectId::from_str(&id)
            .map(Self)
            .map_err(|_| Error::InvalidObjectId)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormattedDateTime(#[serde(with = "time::serde::rfc3339")] pub OffsetDateTime);

impl From<bson::DateTime> for FormattedDateTime {
    fn from(value: bson::DateTime) -> Self {
        Self(value.into())
    }
}

impl From<OffsetDateTime> for FormattedDateTime {
    fn from(value: OffsetDateTime) -> Self {
        Self(value)
    }
}

pub fn verify_password(argon: &Argon2, password: &str, hashed: &str) -> bool {
    let hashed = match PasswordHash::new(hashed) {
        Ok(hashed) => hashed,
        Err(_) => return false,
    };

    argon.verify_password(password.as_bytes(), &hashed).is_ok()
}

pub fn hash_password(argon: &Argon2, password: &str) -> Result<String, Error> {
    let salt = password_hash::SaltString::generate(&mut password_hash::rand_core::OsRng);

    argon
        .hash_password(password.as_bytes(), &salt)
        .map(|it| it.to_string())
        .map_err(Into::into)
}

/// Decimal that accepts either a JSON number or a string of one.
///
/// Clients send per-item prices both ways; the coercion lives here at the
/// serde boundary instead of being scattered through handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DecimalString(pub Decimal);

impl From<Decimal> for DecimalString {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<DecimalString> for Decimal {
    fn from(value: DecimalString) -> Self {
        value.0
    }
}

impl Serialize for DecimalString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for DecimalString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        pub struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = DecimalString;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a decimal number or a string of one")
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Decimal::from(v).into())
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Decimal::from(v).into())
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Decimal::try_from(v)
                    .map(Into::into)
                    .map_err(serde::de::Error::custom)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Decimal::from_str(v)
                    .map(Into::into)
                    .map_err(serde::de::Error::custom)
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

/// Quantity that accepts either a JSON integer or a string of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct QuantityString(pub u32);

impl From<u32> for QuantityString {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<QuantityString> for u32 {
    fn from(value: QuantityString) -> Self {
        value.0
    }
}

impl Serialize for QuantityString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for QuantityString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        fn nonzero<E>(quantity: u32) -> Result<QuantityString, E>
        where
            E: serde::de::Error,
        {
            if quantity == 0 {
                return Err(serde::de::Error::custom("quantity must be at least 1"));
            }
            Ok(quantity.into())
        }

        pub struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = QuantityString;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a positive integer or a string of one")
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u32::try_from(v)
                    .map_err(serde::de::Error::custom)
                    .and_then(nonzero)
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u32::try_from(v)
                    .map_err(serde::de::Error::custom)
                    .and_then(nonzero)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u32::from_str(v)
                    .map_err(serde::de::Error::custom)
                    .and_then(nonzero)
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{DecimalString, QuantityString};

    #[test]
    fn decimal_accepts_number_or_string() {
        let from_number: DecimalString = serde_json::from_str("10.5").unwrap();
        let from_string: DecimalString = serde_json::from_str("\"10.5\"").unwrap();
        let from_integer: DecimalString = serde_json::from_str("10").unwrap();

        assert_eq!(from_number, from_string);
        assert_eq!(from_integer.0, Decimal::from(10));
    }

    #[test]
    fn decimal_rejects_garbage() {
        assert!(serde_json::from_str::<DecimalString>("\"ten\"").is_err());
    }

    #[test]
    fn quantity_accepts_number_or_string() {
        let from_number: QuantityString = serde_json::from_str("2").unwrap();
        let from_string: QuantityString = serde_json::from_str("\"2\"").unwrap();

        assert_eq!(from_number, from_string);
        assert_eq!(from_number.0, 2);
    }

    #[test]
    fn quantity_rejects_zero_negative_and_fractional() {
        assert!(serde_json::from_str::<QuantityString>("0").is_err());
        assert!(serde_json::from_str::<QuantityString>("\"0\"").is_err());
        assert!(serde_json::from_str::<QuantityString>("-1").is_err());
        assert!(serde_json::from_str::<QuantityString>("\"-1\"").is_err());
        assert!(serde_json::from_str::<QuantityString>("1.5").is_err());
    }

    #[test]
    fn password_hash_roundtrip() {
        let argon = argon2::Argon2::default();
        let hash = super::hash_password(&argon, "hunter2hunter2").unwrap();

        assert!(super::verify_password(&argon, "hunter2hunter2", &hash));
        assert!(!super::verify_password(&argon, "hunter3hunter3", &hash));
        assert!(!super::verify_password(&argon, "hunter2hunter2", "not-a-hash"));
    }
}
