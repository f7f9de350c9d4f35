//! Query orchestration: collection routing, iterative retrieval and answer synthesis

pub mod call;
mod orchestrator;
mod router;
mod session;

pub use call::with_policy;
pub use orchestrator::{DeepSearch, NO_RESULT_ANSWER};
pub use router::{CollectionRouter, RouteDecision};
