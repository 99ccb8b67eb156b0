/// Provider Mock Server Library
///
/// Serves CoinGecko, Binance, BlockCypher and Esplora compatible endpoints from
/// scripted data, with per-provider failure injection and request counting.
/// Usable as a standalone binary or embedded in tests through [`spawn`].

pub mod handlers;
pub mod server;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use server::{create_router, run_server, spawn};
pub use state::{MockData, MockState, MockTx, BINANCE, BLOCKCYPHER, COINGECKO, ESPLORA};
pub use types::*;
