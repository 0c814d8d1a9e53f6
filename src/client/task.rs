//! Request tasks and their single-assignment result slots.

use tokio::sync::oneshot;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// Receiver half a caller awaits for its response.
pub(crate) type ResponseSlot = oneshot::Receiver<Result<Response, Error>>;

/// One logical request travelling through the engine.
///
/// Created by the facade, enqueued on exactly one endpoint, consumed by
/// exactly one pipeline (or one dedicated connection). The result slot
/// is completed at most once; a caller that cancelled its await simply
/// never observes the value.
pub(crate) struct RequestTask {
    pub request: Request,
    response: oneshot::Sender<Result<Response, Error>>,
}

impl RequestTask {
    pub fn new(request: Request) -> (Self, ResponseSlot) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                request,
                response: tx,
            },
            rx,
        )
    }

    /// Fulfil the result slot with a completed response.
    pub fn complete(self, response: Response) {
        let _ = self.response.send(Ok(response));
    }

    /// Fail the result slot.
    pub fn fail(self, error: Error) {
        let _ = self.response.send(Err(error));
    }

    /// Whether the caller already gave up waiting. Tasks cancelled
    /// before a writer claims them can be skipped without touching the
    /// socket.
    pub fn is_cancelled(&self) -> bool {
        self.response.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slot_completed_once() {
        let (task, rx) = RequestTask::new(Request::get("/"));
        task.fail(Error::ConnectionClosed);
        assert!(matches!(rx.await, Ok(Err(Error::ConnectionClosed))));
    }

    #[tokio::test]
    async fn dropped_receiver_marks_cancelled() {
        let (task, rx) = RequestTask::new(Request::get("/"));
        assert!(!task.is_cancelled());
        drop(rx);
        assert!(task.is_cancelled());
        // Completing after cancellation is a silent no-op.
        task.fail(Error::ConnectionClosed);
    }
}
