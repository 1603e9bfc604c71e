//! Progress reporting trait.
//!
//! Decouples the engine from whatever presents progress (CLI output, a
//! counter in a test, a channel to another thread). There is no shared
//! progress state inside the engine; each call receives its own callback.

use crate::model::ProgressEvent;

/// Receives one event per file transferred or deleted.
///
/// Called synchronously on the calling thread. A callback that blocks
/// stalls the whole transfer.
pub trait ProgressCallback {
    fn on_file_done(&mut self, event: &ProgressEvent);
}

impl<F> ProgressCallback for F
where
    F: FnMut(&ProgressEvent),
{
    fn on_file_done(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Forward an event if a callback was supplied.
pub(crate) fn report(progress: &mut Option<&mut dyn ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = progress.as_deref_mut() {
        callback.on_file_done(&event);
    }
}
