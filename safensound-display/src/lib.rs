//! Display sinks for the published refresh state
//!
//! Every sink owns a `StateReceiver` and only ever reads the shared
//! state. A sink stops when the publishing side goes away.

pub mod console;
pub mod http;
pub mod render;
pub mod snapshot;

use std::sync::Arc;

use safensound_common::{DisplayState, StateReceiver};

/// Wait for the next published state. Returns `None` once the publisher
/// has been dropped.
pub async fn next_state(receiver: &mut StateReceiver) -> Option<Arc<DisplayState>> {
    loop {
        receiver.changed().await.ok()?;
        if let Some(state) = receiver.borrow_and_update().clone() {
            return Some(state);
        }
    }
}
