//! Data model shared between the refresh engine and the display sinks.

mod types;

use std::sync::Arc;

use tokio::sync::watch;

pub use types::*;

/// Receiving end of the published state; `None` until the first cycle.
pub type StateReceiver = watch::Receiver<Option<Arc<DisplayState>>>;
