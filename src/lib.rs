//! Streaming chat completion pipeline: branching per-chat message trees,
//! multi-provider streaming adapters, token accounting and a prepaid balance
//! ledger, driven end to end by a generation orchestrator and relayed to
//! clients as line-delimited JSON frames.

pub mod abort;
pub mod accountant;
pub mod config;
pub mod error;
pub mod estimator;
pub mod money;
pub mod orchestrator;
pub mod provider;
pub mod relay;
pub mod store;
pub mod types;

pub use config::Settings;
pub use error::{ChatError, ChatResult};
pub use money::Money;
pub use orchestrator::{GenerationOutcome, Orchestrator, OutcomeStatus};
pub use provider::{ChatProvider, HttpProvider};
pub use relay::{RelayFrame, RelaySender};
pub use store::Store;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins when set;
/// otherwise our own crate logs at debug and everything else at info.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chatrelay=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
