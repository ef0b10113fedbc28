//! HTTP layer of the USSD gateway.
//!
//! One meaningful route: the USSD turn. The handler orchestrates the
//! session store, the customer lookup and the menu engine, and always
//! answers the aggregator with a plain-text `con`/`end` frame.

pub mod api_port;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use api_port::UpstreamApiPort;
pub use config::Config;
pub use error::AppError;
pub use router::build_router;
pub use state::AppState;
