//! WebSocket connection lifecycle.
//!
//! One upgraded socket is served by three tasks:
//!
//! - the **read loop** (the upgrade task itself) waits for the next frame
//!   under the idle deadline and dispatches text messages through
//!   [`Session`];
//! - the **writer** exclusively owns the socket sink and writes every queued
//!   frame (responses, pings, hub deliveries, close) under the write
//!   deadline;
//! - the **heartbeat** queues a ping every `ping_interval` until it is told
//!   to stop.
//!
//! Any read error, idle timeout or writer failure ends the read loop, after
//! which the heartbeat is stopped, the connection leaves the hub and the
//! writer drains and closes the socket. There is no other teardown path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at, timeout};

use super::messages::{ClientCommand, ErrorPayload, broadcast_line, reverse, sequenced, upper};
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::domain::{
    ClientHub, CommandHistory, ConnectionId, MessageCounter, OutboundSender, RateLimiter,
};
use crate::error::ConnectionError;
use crate::service::CommandProcessor;

/// Close reason sent when the read deadline expires.
pub const IDLE_TIMEOUT_REASON: &str = "idle timeout";

/// Per-connection dispatch state: identity, rate limiter and history, plus
/// handles onto the shared hub and message counter.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    remote_addr: String,
    limiter: RateLimiter,
    history: CommandHistory,
    hub: ClientHub,
    counter: Arc<MessageCounter>,
}

impl Session {
    /// Creates the state for a freshly upgraded connection.
    #[must_use]
    pub fn new(
        id: ConnectionId,
        remote_addr: String,
        config: &GatewayConfig,
        hub: ClientHub,
        counter: Arc<MessageCounter>,
    ) -> Self {
        Self {
            id,
            remote_addr,
            limiter: RateLimiter::new(config.rate_limit_max_messages, config.rate_limit_window),
            history: CommandHistory::new(config.history_size),
            hub,
            counter,
        }
    }

    /// Connection identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Peer address as reported at upgrade time.
    #[must_use]
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// Handles one inbound text message and returns the frame to send back.
    ///
    /// A rate-limited message gets an untagged error and leaves the counter
    /// and history untouched. Every admitted message, `HISTORY` included, is
    /// recorded in the history after it is handled. `HISTORY` is answered
    /// with an untagged snapshot taken before it is recorded; everything
    /// else is answered as `#<id> <body>`.
    pub async fn handle_text(&self, text: &str) -> String {
        if !self.limiter.allow_message().await {
            tracing::warn!(remote = %self.remote_addr, "rate limit exceeded");
            return ErrorPayload::to_json(self.limiter.rejection_message());
        }

        let id = self.counter.next_id();
        tracing::debug!(remote = %self.remote_addr, msg_id = id, text, "received message");

        let body = match ClientCommand::parse(text) {
            ClientCommand::History => {
                let snapshot = self.history.to_json().await;
                self.history.add(text).await;
                return snapshot;
            }
            ClientCommand::Broadcast(rest) => {
                self.hub
                    .broadcast(broadcast_line(&self.remote_addr, rest), self.id)
                    .await;
                text.to_string()
            }
            ClientCommand::Upper(rest) => upper(rest),
            ClientCommand::Reverse(rest) => reverse(rest),
            ClientCommand::Arithmetic(payload) => CommandProcessor::process_to_json(payload),
            ClientCommand::Echo(rest) => rest.to_string(),
        };

        self.history.add(text).await;
        sequenced(id, &body)
    }
}

/// Serves an upgraded socket until it closes.
pub async fn run_connection(socket: WebSocket, state: AppState, remote_addr: SocketAddr) {
    let config = Arc::clone(&state.config);
    let id = ConnectionId::new();
    let remote = remote_addr.to_string();
    tracing::info!(conn_id = %id, remote = %remote, "connection opened");

    let (ws_tx, ws_rx) = socket.split();
    let (outbound, outbound_rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        outbound_rx,
        config.write_timeout,
        remote.clone(),
    ));

    state.hub.register(id, outbound.clone()).await;

    let (stop_tx, stop_rx) = oneshot::channel();
    let pinger = tokio::spawn(heartbeat(
        outbound.clone(),
        config.ping_interval(),
        config.write_timeout,
        remote.clone(),
        stop_rx,
    ));

    let session = Session::new(
        id,
        remote.clone(),
        &config,
        state.hub.clone(),
        Arc::clone(&state.counter),
    );
    let outcome = read_loop(ws_rx, &session, &outbound, &config).await;

    match outcome {
        Ok(()) => tracing::info!(remote = %remote, "peer closed connection"),
        Err(ConnectionError::IdleTimeout(idle)) => {
            tracing::info!(remote = %remote, ?idle, "read deadline expired, closing");
            let close = Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: IDLE_TIMEOUT_REASON.into(),
            }));
            if outbound.send_timeout(close, config.write_timeout).await.is_err() {
                tracing::debug!(remote = %remote, "close frame could not be queued");
            }
        }
        Err(e) => tracing::warn!(remote = %remote, error = %e, "read error (timeout/close)"),
    }

    let _ = stop_tx.send(());
    let _ = pinger.await;
    state.hub.unregister(id).await;
    drop(outbound);

    if timeout(config.write_timeout, &mut writer).await.is_err() {
        tracing::warn!(remote = %remote, "writer did not drain before the write deadline");
        writer.abort();
    }

    tracing::info!(conn_id = %id, remote = %remote, "connection closed");
}

/// Reads frames until the peer leaves or the connection fails.
///
/// Every received frame, pongs included, restarts the idle deadline.
async fn read_loop(
    mut inbound: SplitStream<WebSocket>,
    session: &Session,
    outbound: &OutboundSender,
    config: &GatewayConfig,
) -> Result<(), ConnectionError> {
    loop {
        let next = tokio::select! {
            biased;
            () = outbound.closed() => return Err(ConnectionError::WriterClosed),
            next = timeout(config.idle_timeout, inbound.next()) => next,
        };

        let frame = match next {
            Err(_) => return Err(ConnectionError::IdleTimeout(config.idle_timeout)),
            Ok(None) => return Ok(()),
            Ok(Some(frame)) => frame?,
        };

        match frame {
            Message::Text(text) => {
                let response = session.handle_text(text.as_str()).await;
                outbound
                    .send_timeout(Message::text(response), config.write_timeout)
                    .await
                    .map_err(|e| match e {
                        SendTimeoutError::Timeout(_) => {
                            ConnectionError::WriteTimeout(config.write_timeout)
                        }
                        SendTimeoutError::Closed(_) => ConnectionError::WriterClosed,
                    })?;
            }
            Message::Pong(data) => {
                tracing::debug!(remote = %session.remote_addr(), data = ?data, "pong");
            }
            Message::Ping(_) => {
                tracing::debug!(remote = %session.remote_addr(), "ping from peer");
            }
            Message::Binary(data) => {
                tracing::debug!(
                    remote = %session.remote_addr(),
                    len = data.len(),
                    "ignoring binary frame"
                );
            }
            Message::Close(frame) => {
                tracing::debug!(remote = %session.remote_addr(), ?frame, "close frame received");
                return Ok(());
            }
        }
    }
}

/// Owns the socket sink. Stops at the first failed or late write, or once
/// every queue handle is gone, and then closes the socket.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::Receiver<Message>,
    write_timeout: Duration,
    remote: String,
) {
    while let Some(frame) = frames.recv().await {
        let closing = matches!(frame, Message::Close(_));
        match timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(remote = %remote, error = %e, "write error");
                return;
            }
            Err(_) => {
                tracing::warn!(remote = %remote, ?write_timeout, "write deadline exceeded");
                return;
            }
        }
        if closing {
            break;
        }
    }
    let _ = timeout(write_timeout, sink.close()).await;
}

/// Queues a ping every `period` until `stop` fires or a ping cannot be
/// queued within `write_timeout`.
async fn heartbeat(
    outbound: OutboundSender,
    period: Duration,
    write_timeout: Duration,
    remote: String,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = &mut stop => return,
            _ = ticker.tick() => {
                let ping = Message::Ping(Bytes::new());
                if let Err(e) = outbound.send_timeout(ping, write_timeout).await {
                    tracing::warn!(remote = %remote, error = %e, "ping write error");
                    return;
                }
                tracing::debug!(remote = %remote, "ping sent");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn session_with(
        config: &GatewayConfig,
        hub: ClientHub,
        counter: Arc<MessageCounter>,
    ) -> Session {
        Session::new(
            ConnectionId::new(),
            "127.0.0.1:50000".to_string(),
            config,
            hub,
            counter,
        )
    }

    fn session() -> Session {
        session_with(
            &GatewayConfig::default(),
            ClientHub::spawn(16),
            Arc::new(MessageCounter::new()),
        )
    }

    #[tokio::test]
    async fn scenario_responses_are_tagged_in_order() {
        let session = session();
        assert_eq!(session.handle_text("UPPER:hello world").await, "#1 HELLO WORLD");
        assert_eq!(session.handle_text("REVERSE:hello").await, "#2 olleh");
        assert_eq!(
            session
                .handle_text(r#"{"command":"add","a":10,"b":5}"#)
                .await,
            r#"#3 {"result":15,"command":"add"}"#
        );
        assert_eq!(
            session
                .handle_text(r#"{"command":"divide","a":1,"b":0}"#)
                .await,
            r##"#4 {"command":"divide","error":"division by zero"}"##
        );
        assert_eq!(session.handle_text("plain text").await, "#5 plain text");
    }

    #[tokio::test]
    async fn history_returns_prior_commands_untagged() {
        let session = session();
        session.handle_text("UPPER:hello world").await;
        session.handle_text("REVERSE:hello").await;
        assert_eq!(
            session.handle_text("HISTORY").await,
            r#"{"history":["UPPER:hello world","REVERSE:hello"],"count":2}"#
        );

        // The previous HISTORY request is recorded like any other message.
        assert_eq!(
            session.handle_text("HISTORY").await,
            r#"{"history":["UPPER:hello world","REVERSE:hello","HISTORY"],"count":3}"#
        );
        assert_eq!(session.handle_text("next").await, "#5 next");
    }

    #[tokio::test]
    async fn history_keeps_last_five() {
        let session = session();
        for i in 0..7 {
            session.handle_text(&format!("m{i}")).await;
        }
        assert_eq!(
            session.handle_text("HISTORY").await,
            r#"{"history":["m2","m3","m4","m5","m6"],"count":5}"#
        );
    }

    #[tokio::test]
    async fn rate_limited_message_skips_counter_and_history() {
        let config = GatewayConfig {
            rate_limit_max_messages: 2,
            ..GatewayConfig::default()
        };
        let counter = Arc::new(MessageCounter::new());
        let session = session_with(&config, ClientHub::spawn(16), Arc::clone(&counter));

        assert_eq!(session.handle_text("a").await, "#1 a");
        assert_eq!(session.handle_text("b").await, "#2 b");
        assert_eq!(
            session.handle_text("c").await,
            r#"{"error":"rate limit exceeded: max 2 messages per minute"}"#
        );
        assert_eq!(counter.current(), 2);
    }

    #[tokio::test]
    async fn eleventh_message_is_rejected_by_default() {
        let session = session();
        for i in 1..=10 {
            assert_eq!(session.handle_text("x").await, format!("#{i} x"));
        }
        assert_eq!(
            session.handle_text("x").await,
            r#"{"error":"rate limit exceeded: max 10 messages per minute"}"#
        );
    }

    #[tokio::test]
    async fn counter_is_shared_between_sessions() {
        let config = GatewayConfig::default();
        let hub = ClientHub::spawn(16);
        let counter = Arc::new(MessageCounter::new());
        let a = session_with(&config, hub.clone(), Arc::clone(&counter));
        let b = session_with(&config, hub, Arc::clone(&counter));

        assert_eq!(a.handle_text("one").await, "#1 one");
        assert_eq!(b.handle_text("two").await, "#2 two");
        assert_eq!(a.handle_text("three").await, "#3 three");
    }

    #[tokio::test]
    async fn broadcast_reaches_peers_and_echoes_to_sender() {
        let hub = ClientHub::spawn(16);
        let config = GatewayConfig::default();
        let sender = session_with(&config, hub.clone(), Arc::new(MessageCounter::new()));

        let (peer_tx, mut peer_rx) = mpsc::channel(4);
        let (self_tx, mut self_rx) = mpsc::channel(4);
        hub.register(ConnectionId::new(), peer_tx).await;
        hub.register(sender.id(), self_tx).await;

        assert_eq!(sender.handle_text("BROADCAST:hi").await, "#1 BROADCAST:hi");
        assert_eq!(hub.client_count().await, 2);

        assert_eq!(
            peer_rx.try_recv().ok(),
            Some(Message::text("[BROADCAST from 127.0.0.1:50000] hi"))
        );
        assert!(self_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pings_until_stopped() {
        let (tx, mut rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(heartbeat(
            tx,
            Duration::from_secs(27),
            Duration::from_secs(5),
            "peer".to_string(),
            stop_rx,
        ));

        let Some(frame) = rx.recv().await else {
            panic!("expected a ping");
        };
        assert!(matches!(frame, Message::Ping(_)));

        let _ = stop_tx.send(());
        tokio_test::assert_ok!(task.await);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_stops_when_writer_is_gone() {
        let (tx, rx) = mpsc::channel(4);
        let (_stop_tx, stop_rx) = oneshot::channel();
        drop(rx);
        let task = tokio::spawn(heartbeat(
            tx,
            Duration::from_secs(1),
            Duration::from_secs(1),
            "peer".to_string(),
            stop_rx,
        ));
        let Ok(()) = task.await else {
            panic!("heartbeat task failed");
        };
    }
}
