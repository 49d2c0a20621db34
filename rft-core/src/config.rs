use std::time::Duration;

/// Per-endpoint configuration. Kept as a plain struct rather than global
/// constants, per the teacher's own design notes about avoiding
/// process-wide mutable defaults for tunables like window size and RTO.
#[derive(Debug, Clone, Copy)]
pub struct EndpointConfig {
    pub window_size: usize,
    pub rto: Duration,
    /// Server-side only: number of idle retransmission ticks tolerated
    /// after sending FIN+ACK before the endpoint tears itself down.
    pub fin_retry_budget: u32,
}

impl EndpointConfig {
    pub const DEFAULT_RTO: Duration = Duration::from_secs(2);
    pub const DEFAULT_FIN_RETRY_BUDGET: u32 = 3;
    pub const DEFAULT_GBN_WINDOW: usize = 4;

    pub fn stop_and_wait() -> EndpointConfig {
        EndpointConfig {
            window_size: 1,
            rto: Self::DEFAULT_RTO,
            fin_retry_budget: Self::DEFAULT_FIN_RETRY_BUDGET,
        }
    }

    pub fn go_back_n(window_size: usize) -> EndpointConfig {
        EndpointConfig {
            window_size,
            rto: Self::DEFAULT_RTO,
            fin_retry_budget: Self::DEFAULT_FIN_RETRY_BUDGET,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig::go_back_n(Self::DEFAULT_GBN_WINDOW)
    }
}
