pub mod clock;
pub mod eligibility;
pub mod gateway;
pub mod metrics;
pub mod providers;
pub mod reconciler;
pub mod refunds;
pub mod status_mapper;
pub mod store;

pub use clock::BusinessClock;
pub use gateway::{GatewayError, MidtransClient, MockGateway, PaymentGateway};
pub use metrics::{get_metrics, init_metrics};
pub use providers::{GeminiTextProvider, MockTextProvider, ProviderError, TextProvider};
pub use reconciler::{BookingOutcome, NotificationReconciler, ReconcileOutcome};
pub use refunds::{RefundError, RefundReceipt, RefundService};
pub use store::{BookingStore, InMemoryStore, PgStore};
