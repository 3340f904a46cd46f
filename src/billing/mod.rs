//! Subscription billing: the plan catalog, gateway checkout, payment
//! signature verification, plan activation, and webhook handling.

pub mod activation;
pub mod checkout;
pub mod plans;
pub mod sea_orm_store;
pub mod signature;
pub mod storage;
pub mod webhook;

pub use activation::{ActivateRequest, ActivationManager};
pub use checkout::{
    CheckoutManager, CheckoutRequest, CheckoutSession, GatewayClient, GatewayOrder,
    LiveGatewayClient,
};
pub use plans::{PlanCatalog, PlanConfig};
pub use sea_orm_store::SeaOrmBillingStore;
pub use storage::{
    Activation, BillingStore, ChargeStatus, InMemoryBillingStore, NewCharge, PendingCharge,
    PlanRecord, PlanRecordStatus,
};
pub use webhook::{WebhookHandler, WebhookOutcome, SIGNATURE_HEADER};
