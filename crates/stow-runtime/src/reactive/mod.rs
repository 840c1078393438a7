#![forbid(unsafe_code)]

//! Change-tracked values.
//!
//! - [`Observable`]: a shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//!
//! Every mutation goes through [`Observable::set`] or
//! [`Observable::update`]; those are the only places a change can originate,
//! which is what lets the persistence layer react to each one.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.

pub mod observable;

pub use observable::{Observable, Subscription};
