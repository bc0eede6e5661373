use metrics::Counter;
use metrics_derive::Metrics;

/// Operation outcomes seen by the entry point.
#[derive(Metrics, Clone)]
#[metrics(scope = "smart_account_entry_point")]
pub struct Metrics {
    #[metric(describe = "Operations that passed account and sponsor validation")]
    pub ops_validated: Counter,

    #[metric(describe = "Operations rejected during validation")]
    pub ops_rejected: Counter,

    #[metric(describe = "Operations whose execution reverted")]
    pub ops_reverted: Counter,

    #[metric(describe = "Operations executed successfully")]
    pub ops_executed: Counter,
}
