use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::state::ChannelEvent;

/// Receiving end of a channel's events.
///
/// Ends after `ConnectionClosed`: later calls return `None`.
pub struct ChannelEvents {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    finished: bool,
}

impl ChannelEvents {
    pub(crate) fn new(events: mpsc::UnboundedReceiver<ChannelEvent>) -> Self {
        Self {
            events,
            finished: false,
        }
    }

    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await?;
        self.observe(&event);
        Some(event)
    }

    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.try_recv().ok()?;
        self.observe(&event);
        Some(event)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn observe(&mut self, event: &ChannelEvent) {
        if matches!(event, ChannelEvent::ConnectionClosed(_)) {
            self.finished = true;
            self.events.close();
        }
    }
}

impl Stream for ChannelEvents {
    type Item = ChannelEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                this.observe(&event);
                Poll::Ready(Some(event))
            }
            other => other,
        }
    }
}
