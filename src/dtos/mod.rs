pub mod auth;
pub mod plan;
pub mod subscription;

pub use auth::{LoginRequest, RegisterRequest};
pub use plan::{CreatePlanRequest, ListPlansQuery};
pub use subscription::{
    CancelSubscriptionRequest, CreateSubscriptionRequest, ListSubscriptionsQuery,
    UpgradeSubscriptionRequest,
};
