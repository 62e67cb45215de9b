use crate::models::state::ExchangeState;

/// Event delegate for exchange session notifications.
///
/// Called from whichever thread drives the exchange, never from the UI
/// thread. Implementations should marshal to the UI thread if needed.
pub trait ExchangeDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &ExchangeState);
}
