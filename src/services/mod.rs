//! Lifecycle services. Dependency order, leaves first: the commission ledger
//! (pure calculations), then orders, then deliveries, then the request broker
//! which touches both.

pub mod commission;
pub mod deliveries;
pub mod delivery_requests;
pub mod orders;
