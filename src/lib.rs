//! minefleet runs a fleet of simulated cloud-mining session agents. Each
//! agent is bound to one wallet secret, optionally routed through its own
//! proxy, reports simulated earnings to a remote accounting service on a
//! fixed cadence, and persists its session state so a restart resumes
//! rather than resets.

pub mod agent;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod credentials;
pub mod identity;
pub mod persistence;
pub mod remote;
pub mod retry;
pub mod transport;
pub mod types;
