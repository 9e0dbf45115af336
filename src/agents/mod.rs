/// Birthday notification agents.
///
/// The pipeline is a straight line:
///
/// - `memory`: scans the birthday file for today's events
/// - `master`: routes each alert, logging every hop
/// - `elderly`: reminds the elderly user and captures their reply
/// - `relative`: turns the reply into insights for a younger relative
/// - `orchestrator`: wires the agents and drives one-shot or polling runs
use std::sync::{Mutex, MutexGuard};

pub mod elderly;
pub mod master;
pub mod memory;
pub mod orchestrator;
pub mod relative;

/// Locks an agent-owned log, recovering the data if a writer panicked.
pub(crate) fn lock_log<T>(log: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    log.lock().unwrap_or_else(|e| e.into_inner())
}
