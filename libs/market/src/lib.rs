mod price_client;

pub mod chart;
pub mod indicators;
pub mod stats;
pub mod table;

pub use price_client::{Bar, HistoryProvider, PriceClient};
pub use table::PriceTable;
