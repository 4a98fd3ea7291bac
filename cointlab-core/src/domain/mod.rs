//! Domain types for CointLab

pub mod bar;
pub mod pair;
pub mod result;

pub use bar::{MarketBar, PricePoint};
pub use pair::SymbolPair;
pub use result::{CointegrationRecord, PValue, WindowResult, UNTESTABLE_SENTINEL};
