pub mod plan;
pub mod plan_upgrade;
pub mod subscription;
pub mod user;

pub use plan::{
    group_plan_rows, IntervalKind, NewPlan, NewPlanInterval, NewPlanPrice, Plan, PlanCatalogRow,
    PlanInterval, PlanIntervalPrice, PlanTreeResponse, ResolvedPrice,
};
pub use plan_upgrade::PlanUpgrade;
pub use subscription::{
    ListSubscriptionsFilter, NewSubscription, Subscription, SubscriptionResponse,
    SubscriptionStatus,
};
pub use user::{NewUser, User, UserResponse};

/// Wire format for timestamps: `%Y-%m-%d %H:%M:%S` in UTC.
pub mod timestamp_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)?;
        Ok(naive.and_utc())
    }
}

/// Same wire format for nullable timestamps.
pub mod timestamp_format_option {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::timestamp_format::FORMAT;

    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match dt {
            Some(dt) => serializer.serialize_some(&dt.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            Some(s) => {
                let naive =
                    NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)?;
                Ok(Some(naive.and_utc()))
            }
            None => Ok(None),
        }
    }
}
