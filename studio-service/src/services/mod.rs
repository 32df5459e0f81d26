pub mod balance;
pub mod database;
pub mod exchange_rate;
pub mod metrics;
pub mod notifier;
pub mod payment_plan;

pub use balance::BalanceService;
pub use database::Database;
pub use exchange_rate::{ExchangeRate, ExchangeRateService, RateSource};
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{HttpSmsProvider, MockSmsProvider, SmsMessage, SmsProvider, SmsReceipt};
