//! CointLab Core — pairwise rolling cointegration.
//!
//! This crate contains the computational heart of the engine:
//! - Domain types (price points, market bars, symbol pairs, window results)
//! - Series alignment onto a shared date axis
//! - Pair enumeration over two symbol groups
//! - Statistics: OLS, ADF with AIC lag selection, MacKinnon p-values, Engle-Granger
//! - Rolling calculator, incremental planner, result assembler
//! - Parquet price cache and Binance kline parsing

pub mod assembler;
pub mod data;
pub mod domain;
pub mod pairs;
pub mod planner;
pub mod rolling;
pub mod stats;

pub use assembler::{assemble, Assembly, PairFailure, PairOutcome};
pub use pairs::enumerate_pairs;
pub use planner::{plan_all, plan_pair, PlanError, WindowPlan};
pub use rolling::{PairError, RollingCalculator};
