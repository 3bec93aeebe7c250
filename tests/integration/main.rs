//! End-to-end tests: configuration chain → staking session → CSV trade
//! log → analysis, wired together through the public API only.

mod common;
mod config_chain;
mod session_flow;
mod trade_log;
