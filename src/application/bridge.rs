//! Host/webview message channel.
//!
//! The webview gets no handle on anything host-owned: it sees serialized
//! [`HostMessage`] frames and can only answer with [`WebviewMessage`] frames.
//! Both directions are FIFO, neither direction blocks the sender.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::message::{decode, encode};
use crate::domain::{AppError, HostMessage, Result, WebviewMessage};

/// What the host-side handler is called with.
#[derive(Debug)]
pub enum Inbound {
    /// A well-formed webview message.
    Message(WebviewMessage),
    /// A frame that broke the protocol. Always a `ProtocolViolation`.
    Rejected(AppError),
    /// The webview side went away. Delivered once, last.
    Disconnected,
}

/// Host end of the bridge. One per preview session.
#[derive(Debug)]
pub struct HostWebviewBridge {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: Option<mpsc::UnboundedReceiver<String>>,
    pump: Option<JoinHandle<()>>,
}

/// Webview end of the bridge.
#[derive(Debug)]
pub struct WebviewPort {
    from_host: mpsc::UnboundedReceiver<String>,
    to_host: mpsc::UnboundedSender<String>,
}

/// Create a connected bridge/port pair.
#[must_use]
pub fn channel() -> (HostWebviewBridge, WebviewPort) {
    let (host_tx, webview_rx) = mpsc::unbounded_channel();
    let (webview_tx, host_rx) = mpsc::unbounded_channel();

    let bridge = HostWebviewBridge {
        outbound: Some(host_tx),
        inbound: Some(host_rx),
        pump: None,
    };
    let port = WebviewPort {
        from_host: webview_rx,
        to_host: webview_tx,
    };

    (bridge, port)
}

impl HostWebviewBridge {
    /// Queue a message for the webview. Never waits for delivery.
    ///
    /// # Errors
    /// Returns `ChannelClosed` after [`dispose`](Self::dispose) or once the
    /// webview side is gone; nothing is delivered in that case.
    pub fn send(&self, message: &HostMessage) -> Result<()> {
        let outbound = self.outbound.as_ref().ok_or(AppError::ChannelClosed)?;
        let frame = encode(message)?;
        outbound.send(frame).map_err(|_| AppError::ChannelClosed)
    }

    /// Register the inbound handler.
    ///
    /// The handler runs on its own task and sees frames strictly one at a time
    /// in arrival order. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns error if a handler is already registered or the bridge is disposed.
    pub fn on_message<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(Inbound) + Send + 'static,
    {
        if self.outbound.is_none() {
            return Err(AppError::ChannelClosed);
        }
        let mut inbound = self.inbound.take().ok_or_else(|| AppError::InvalidData {
            message: "bridge already has an inbound handler".into(),
        })?;

        self.pump = Some(tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                match decode::<WebviewMessage>(&frame) {
                    Ok(message) => handler(Inbound::Message(message)),
                    Err(err) => {
                        tracing::warn!(error = %err, "Rejected webview frame");
                        handler(Inbound::Rejected(err));
                    }
                }
            }
            handler(Inbound::Disconnected);
        }));

        Ok(())
    }

    /// Whether sends can still succeed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.as_ref().is_none_or(mpsc::UnboundedSender::is_closed)
    }

    /// Close the bridge.
    ///
    /// Frames already queued stay readable by the webview; no new frame is
    /// accepted and inbound handling stops.
    pub fn dispose(&mut self) {
        if self.outbound.take().is_some() {
            tracing::debug!("Bridge disposed");
        }
        self.inbound = None;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for HostWebviewBridge {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl WebviewPort {
    /// Next raw frame from the host; `None` once the host disposed the bridge
    /// and everything queued has been read.
    pub async fn recv_frame(&mut self) -> Option<String> {
        self.from_host.recv().await
    }

    /// Next decoded host message. Unknown tags surface as `ProtocolViolation`.
    pub async fn recv(&mut self) -> Option<Result<HostMessage>> {
        let frame = self.recv_frame().await?;
        Some(decode(&frame))
    }

    /// Decoded host message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Result<HostMessage>> {
        let frame = self.from_host.try_recv().ok()?;
        Some(decode(&frame))
    }

    /// Send a typed message to the host.
    ///
    /// # Errors
    /// Returns `ChannelClosed` if the host end is gone.
    pub fn post(&self, message: &WebviewMessage) -> Result<()> {
        self.post_frame(encode(message)?)
    }

    /// Send a raw frame to the host. The host validates it.
    ///
    /// # Errors
    /// Returns `ChannelClosed` if the host end is gone.
    pub fn post_frame(&self, frame: impl Into<String>) -> Result<()> {
        self.to_host
            .send(frame.into())
            .map_err(|_| AppError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttemptToken, FailureKind, Platform, PreviewState, UserAction};

    fn status(attempt: u64, status: PreviewState) -> HostMessage {
        HostMessage::LaunchStatus {
            attempt: AttemptToken::new(attempt),
            status,
        }
    }

    #[tokio::test]
    async fn test_send_is_fifo() {
        let (bridge, mut port) = channel();
        bridge.send(&status(1, PreviewState::Resolving)).unwrap();
        bridge.send(&status(1, PreviewState::Building)).unwrap();

        assert_eq!(port.recv().await.unwrap().unwrap(), status(1, PreviewState::Resolving));
        assert_eq!(port.recv().await.unwrap().unwrap(), status(1, PreviewState::Building));
    }

    #[tokio::test]
    async fn test_dispose_flushes_then_rejects_sends() {
        let (mut bridge, mut port) = channel();
        bridge.send(&status(2, PreviewState::Launching)).unwrap();
        bridge.dispose();

        let err = bridge
            .send(&status(2, PreviewState::Failed {
                kind: FailureKind::ChannelClosed,
            }))
            .unwrap_err();
        assert!(matches!(err, AppError::ChannelClosed));
        assert!(bridge.is_closed());

        assert_eq!(port.recv().await.unwrap().unwrap(), status(2, PreviewState::Launching));
        assert!(port.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_webview_gone_is_channel_closed() {
        let (bridge, port) = channel();
        drop(port);
        assert!(bridge.is_closed());
        assert!(matches!(
            bridge.send(&status(1, PreviewState::Idle)),
            Err(AppError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_handler_sees_messages_rejections_and_disconnect_in_order() {
        let (mut bridge, port) = channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bridge
            .on_message(move |inbound| {
                let _ = tx.send(inbound);
            })
            .unwrap();

        port.post(&WebviewMessage::Ready).unwrap();
        port.post_frame(r#"{"v":1,"type":"readFile","path":"/etc/passwd"}"#)
            .unwrap();
        port.post(&WebviewMessage::UserAction {
            action: UserAction::Launch {
                platform: Platform::Ios,
            },
        })
        .unwrap();
        drop(port);

        assert!(matches!(
            rx.recv().await,
            Some(Inbound::Message(WebviewMessage::Ready))
        ));
        assert!(matches!(
            rx.recv().await,
            Some(Inbound::Rejected(AppError::ProtocolViolation { .. }))
        ));
        assert!(matches!(
            rx.recv().await,
            Some(Inbound::Message(WebviewMessage::UserAction { .. }))
        ));
        assert!(matches!(rx.recv().await, Some(Inbound::Disconnected)));
    }

    #[tokio::test]
    async fn test_only_one_handler() {
        let (mut bridge, _port) = channel();
        bridge.on_message(|_| {}).unwrap();
        assert!(bridge.on_message(|_| {}).is_err());
    }

    #[tokio::test]
    async fn test_no_handler_after_dispose() {
        let (mut bridge, _port) = channel();
        bridge.dispose();
        assert!(matches!(
            bridge.on_message(|_| {}),
            Err(AppError::ChannelClosed)
        ));
    }
}
