//! Tenant resolution and quota enforcement.
//!
//! Every authenticated request goes identity -> tenant context (provisioning
//! on first use). Metered handlers reserve quota through the usage ledger
//! before acting. Billing events arrive out of band and only ever upgrade.

pub mod allowance;
pub mod billing;
pub mod context;
pub mod error;
pub mod identity;
pub mod provisioning;
pub mod roles;
pub mod usage;

pub use allowance::{ActionKind, Allowance, PlanLimits, Remaining};
pub use billing::{BillingEventApplier, WebhookOutcome};
pub use context::{TenantContext, TenantContextResolver, UsageSnapshot};
pub use error::TenancyError;
pub use identity::IdentityResolver;
pub use provisioning::TenantProvisioner;
pub use roles::Permission;
pub use usage::{Reservation, UsageLedger};
