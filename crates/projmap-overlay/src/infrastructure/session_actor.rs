//! The session actor: the one task that owns the [`OverlayService`].
//!
//! Every mutation of the session goes through this task's inbox, so command
//! handlers never run concurrently.  Handlers are synchronous; the actor
//! never awaits while holding a half-applied change.
//!
//! ```text
//!  reader ──ActorRequest──▶ [actor] ──line──▶ writer
//!  host   ──ActorRequest──▶    │
//!                              └──RenderSnapshot──▶ watch subscribers
//! ```

use projmap_core::Point;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::application::{Flow, OverlayService};
use crate::infrastructure::render_bridge::RenderSnapshot;

/// The actor task has exited and can take no more requests.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("session actor has stopped")]
pub struct ActorStopped;

/// A request for the session actor.
#[derive(Debug)]
pub enum ActorRequest {
    /// One inbound protocol line; the flow decision is sent back.
    Line {
        line: String,
        reply: oneshot::Sender<Flow>,
    },
    /// An inbound line that could not be decoded as text.
    Unreadable { line: String, reason: String },
    /// A pointer click from the host, in screen coordinates.
    PointerClick(Point),
    /// The host asked to drop the calibration markers.
    ClearMarkers,
}

/// Cheap, cloneable sender side of the actor's inbox.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inbox: mpsc::Sender<ActorRequest>,
}

impl SessionHandle {
    /// Submits a protocol line and waits until it has been handled.
    ///
    /// # Errors
    ///
    /// Returns [`ActorStopped`] if the actor has exited.
    pub async fn submit_line(&self, line: String) -> Result<Flow, ActorStopped> {
        let (reply, flow) = oneshot::channel();
        self.inbox
            .send(ActorRequest::Line { line, reply })
            .await
            .map_err(|_| ActorStopped)?;
        flow.await.map_err(|_| ActorStopped)
    }

    /// Reports an inbound line that is not valid UTF-8.  `line` is a lossy
    /// rendering for logs.
    ///
    /// # Errors
    ///
    /// Returns [`ActorStopped`] if the actor has exited.
    pub async fn report_unreadable(
        &self,
        line: String,
        reason: String,
    ) -> Result<(), ActorStopped> {
        self.inbox
            .send(ActorRequest::Unreadable { line, reason })
            .await
            .map_err(|_| ActorStopped)
    }

    /// Forwards a pointer click.
    ///
    /// # Errors
    ///
    /// Returns [`ActorStopped`] if the actor has exited.
    pub async fn pointer_click(&self, p: Point) -> Result<(), ActorStopped> {
        self.inbox
            .send(ActorRequest::PointerClick(p))
            .await
            .map_err(|_| ActorStopped)
    }

    /// Asks the actor to drop the calibration markers.
    ///
    /// # Errors
    ///
    /// Returns [`ActorStopped`] if the actor has exited.
    pub async fn clear_markers(&self) -> Result<(), ActorStopped> {
        self.inbox
            .send(ActorRequest::ClearMarkers)
            .await
            .map_err(|_| ActorStopped)
    }
}

/// A running session actor.
#[derive(Debug)]
pub struct SessionActor {
    handle: SessionHandle,
    snapshots: watch::Receiver<RenderSnapshot>,
    task: JoinHandle<OverlayService>,
}

impl SessionActor {
    /// Spawns the actor task.
    ///
    /// `capacity` bounds the inbox; reply lines go to `outbound`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.  Configuration validation rejects that
    /// value before it gets here.
    pub fn spawn(
        service: OverlayService,
        capacity: usize,
        outbound: mpsc::Sender<String>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(service.snapshot());
        let task = tokio::spawn(run_actor(service, inbox_rx, outbound, snapshot_tx));
        Self {
            handle: SessionHandle { inbox: inbox_tx },
            snapshots: snapshot_rx,
            task,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// A receiver that sees a fresh [`RenderSnapshot`] after every request.
    pub fn subscribe(&self) -> watch::Receiver<RenderSnapshot> {
        self.snapshots.clone()
    }

    /// Closes this handle and waits for the actor to drain its inbox.
    ///
    /// The actor exits once every [`SessionHandle`] clone is dropped.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] if the actor task panicked.
    pub async fn shutdown(self) -> Result<OverlayService, JoinError> {
        drop(self.handle);
        self.task.await
    }
}

async fn run_actor(
    mut service: OverlayService,
    mut inbox: mpsc::Receiver<ActorRequest>,
    outbound: mpsc::Sender<String>,
    snapshots: watch::Sender<RenderSnapshot>,
) -> OverlayService {
    while let Some(request) = inbox.recv().await {
        match request {
            ActorRequest::Line { line, reply } => {
                let outcome = service.submit_line(&line);
                for out in outcome.outbound {
                    if outbound.send(out).await.is_err() {
                        warn!("writer has stopped; dropping outbound line");
                    }
                }
                // The submitter may have given up waiting.
                let _ = reply.send(outcome.flow);
            }
            ActorRequest::Unreadable { line, reason } => {
                service.reject_unreadable(&line, &reason);
            }
            ActorRequest::PointerClick(p) => {
                if let Some(outcome) = service.pointer_click(p) {
                    debug!(?outcome, "pointer click handled");
                }
            }
            ActorRequest::ClearMarkers => {
                service.clear_markers();
            }
        }
        snapshots.send_replace(service.snapshot());
    }
    debug!("session actor inbox closed");
    service
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use projmap_core::Mode;

    #[tokio::test]
    async fn test_query_reply_reaches_outbound_before_flow() {
        // Arrange
        let (tx, mut rx) = mpsc::channel(4);
        let actor = SessionActor::spawn(OverlayService::default(), 4, tx);

        // Act
        let flow = actor
            .handle()
            .submit_line(r#"{"op":"GetRects"}"#.to_string())
            .await
            .unwrap();

        // Assert: the reply is already queued when the flow comes back.
        assert_eq!(flow, Flow::Continue);
        assert_eq!(rx.try_recv().unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_full_outbound_queue_holds_back_further_queries() {
        // Arrange
        let (tx, mut rx) = mpsc::channel(1);
        let actor = SessionActor::spawn(OverlayService::default(), 4, tx);
        let handle = actor.handle().clone();
        handle
            .submit_line(r#"{"op":"GetRects"}"#.to_string())
            .await
            .unwrap();

        // Act
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            handle.submit_line(r#"{"op":"GetRects"}"#.to_string()),
        )
        .await;

        // Assert
        assert!(blocked.is_err(), "second reply should wait for the writer");
        assert_eq!(rx.recv().await.unwrap(), "[]");
        assert_eq!(rx.recv().await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_unreadable_line_leaves_session_untouched() {
        let (tx, _rx) = mpsc::channel(4);
        let actor = SessionActor::spawn(OverlayService::default(), 4, tx);

        actor
            .handle()
            .report_unreadable("\u{fffd}".to_string(), "invalid utf-8".to_string())
            .await
            .unwrap();
        let flow = actor
            .handle()
            .submit_line(r#"{"op":"AddRect","rectangle":[0,0,1,1]}"#.to_string())
            .await
            .unwrap();

        assert_eq!(flow, Flow::Continue);
        let service = actor.shutdown().await.unwrap();
        assert_eq!(service.rectangles().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_published_after_each_request() {
        // Arrange
        let (tx, _rx) = mpsc::channel(4);
        let actor = SessionActor::spawn(OverlayService::default(), 4, tx);
        let mut snapshots = actor.subscribe();
        assert!(snapshots.borrow_and_update().shapes.is_empty());

        // Act
        actor
            .handle()
            .submit_line(r#"{"op":"AddRect","rectangle":[0,0,1,1]}"#.to_string())
            .await
            .unwrap();

        // Assert
        snapshots.changed().await.unwrap();
        assert_eq!(snapshots.borrow().shapes.len(), 1);
    }

    #[tokio::test]
    async fn test_host_events_are_serialized_with_lines() {
        // Arrange
        let (tx, _rx) = mpsc::channel(4);
        let actor = SessionActor::spawn(OverlayService::default(), 4, tx);
        let handle = actor.handle().clone();

        // Act
        handle
            .submit_line(r#"{"op":"SetInitSize","size":[10,5]}"#.to_string())
            .await
            .unwrap();
        for (x, y) in [(100.0, 100.0), (700.0, 100.0), (700.0, 500.0), (100.0, 500.0)] {
            handle.pointer_click(Point::new(x, y)).await.unwrap();
        }
        drop(handle);

        // Assert
        let service = actor.shutdown().await.unwrap();
        assert_eq!(service.mode(), Mode::Drawing);
    }

    #[tokio::test]
    async fn test_clear_markers_request_drops_markers() {
        let (tx, _rx) = mpsc::channel(4);
        let actor = SessionActor::spawn(OverlayService::default(), 4, tx);
        actor.handle().pointer_click(Point::new(1.0, 1.0)).await.unwrap();

        actor.handle().clear_markers().await.unwrap();

        let service = actor.shutdown().await.unwrap();
        assert!(service.session().markers().is_empty());
    }

    #[tokio::test]
    async fn test_stopped_actor_is_reported() {
        let (tx, _rx) = mpsc::channel(4);
        let actor = SessionActor::spawn(OverlayService::default(), 4, tx);
        let handle = actor.handle().clone();
        actor.task.abort();
        // Wait for the abort to take effect.
        let _ = actor.task.await;

        let result = handle.submit_line(r#"{"op":"GetRects"}"#.to_string()).await;

        assert_eq!(result, Err(ActorStopped));
    }
}
