use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    pub price_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpgradeSubscriptionRequest {
    pub subscription_id: Uuid,
    pub new_price_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelSubscriptionRequest {
    pub subscription_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListSubscriptionsQuery {
    pub status: Option<String>,
    pub plan_id: Option<Uuid>,
}
