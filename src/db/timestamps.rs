//! Serde adapters storing chrono timestamps as native BSON datetimes, so that
//! range filters such as `$gte` compare chronologically.

use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use bson::serde_helpers::chrono_datetime_as_bson_datetime as required;

pub mod optional {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => bson::DateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<bson::DateTime>::deserialize(deserializer).map(|v| v.map(|dt| dt.to_chrono()))
    }
}

pub fn to_bson(dt: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_chrono(dt)
}
