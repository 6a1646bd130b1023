//! Application services: event translation, reconciliation and the
//! controller that drives them.

pub mod controller;
pub mod event_translator;
pub mod reconciler;

pub use controller::{Controller, ControllerState, ControllerStats};
pub use event_translator::EventTranslator;
pub use reconciler::Reconciler;
