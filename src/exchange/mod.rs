//! Exchange integration for the pair rotator.
//!
//! ## Binance spot
//! REST connectivity for:
//! - Market data (last-trade prices)
//! - Account operations (free balances, market orders)
//!
//! All consumers go through the [`ExchangeGateway`] trait so the engine can
//! be exercised against the in-memory [`MockExchange`] in tests.

mod client;
pub mod mock;
mod traits;
mod types;

pub use client::BinanceSpotClient;
pub use mock::MockExchange;
pub use traits::ExchangeGateway;
pub use types::*;
