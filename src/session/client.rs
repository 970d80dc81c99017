//! Session client
//!
//! The per-session run loop: signaling socket, message dispatch,
//! offer/answer negotiation, heartbeat and teardown. Reconnection is a
//! hard reset: the whole session context is rebuilt from scratch after
//! a fixed delay, never an incremental renegotiation.

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

use super::heartbeat::Heartbeat;
use super::signaling::SignalMessage;
use super::transport::TransportChannel;
use super::{peer, SessionError, SessionPhase, StatusState};
use crate::config::Config;
use crate::control::{validate_manual_action, RemoteAction};
use crate::surface::VideoSurface;

/// Commands the embedder drives the session with.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Join a transmission by id and password.
    Connect {
        transmission_id: String,
        password: String,
    },
    /// Leave the transmission and tear the peer connection down.
    Disconnect,
    /// Toggle remote audio capture.
    SetAudioCapture(bool),
    /// Select a remote display source.
    SetDisplay(i64),
    /// Validate and send a manually entered raw action document.
    SendRaw(String),
    /// Tear everything down and stop the run loop.
    Shutdown,
}

/// Notifications the session emits toward the embedding UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(SessionPhase),
    IceState(String),
    SignalingState(String),
    /// Lit iff the ICE state is exactly `connected`.
    ConnectedIndicator(bool),
    ChannelState { open: bool },
    /// A video track id became selectable, reported exactly once.
    DisplayAdded(String),
    /// Manual raw action rejected by validation.
    ManualActionRejected(String),
}

/// Handle the embedder keeps: the command sender plus the transport
/// send capability for the input engine.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    transport: TransportChannel,
}

impl ClientHandle {
    pub fn send(&self, command: ClientCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn transport(&self) -> &TransportChannel {
        &self.transport
    }
}

enum SessionExit {
    Shutdown,
    Restart(&'static str),
}

/// Per-connection negotiation state, rebuilt on every (re)connect.
struct SessionContext {
    id: String,
    client_id: String,
    transmission_id: String,
    peer: Option<Arc<RTCPeerConnection>>,
    displays: Arc<Mutex<HashSet<String>>>,
}

impl SessionContext {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: "000000".to_string(),
            transmission_id: String::new(),
            peer: None,
            displays: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

pub struct SessionClient {
    config: Arc<Config>,
    surface: Arc<dyn VideoSurface>,
    transport: TransportChannel,
    status: Arc<StatusState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
}

impl SessionClient {
    pub fn new(
        config: Arc<Config>,
        surface: Arc<dyn VideoSurface>,
    ) -> (
        Self,
        ClientHandle,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = TransportChannel::new(config.logging.log_actions);

        let client = Self {
            config,
            surface,
            transport: transport.clone(),
            status: Arc::new(StatusState::new()),
            events: event_tx,
            commands: command_rx,
        };
        let handle = ClientHandle {
            commands: command_tx,
            transport,
        };
        (client, handle, event_rx)
    }

    pub fn status(&self) -> Arc<StatusState> {
        self.status.clone()
    }

    /// Run until shutdown. Socket errors and liveness timeouts restart
    /// the whole session after the configured delay.
    pub async fn run(mut self) {
        let delay = Duration::from_millis(self.config.heartbeat.reconnect_delay_ms);
        loop {
            match self.run_session().await {
                SessionExit::Shutdown => break,
                SessionExit::Restart(reason) => {
                    warn!("session reset ({}); reconnecting in {:?}", reason, delay);
                    self.set_phase(SessionPhase::Reconnecting);
                    tokio::time::sleep(delay).await;
                }
            }
        }
        self.set_phase(SessionPhase::Closed);
        info!("session client stopped");
    }

    async fn run_session(&mut self) -> SessionExit {
        let url = self.config.signaling.url.clone();
        let stream = match connect_async(url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                error!("signaling connect to {} failed: {}", url, e);
                return SessionExit::Restart("signaling connect failed");
            }
        };

        let mut ctx = SessionContext::new();
        info!("signaling connected to {} (session {})", url, ctx.id);

        let (write, mut read) = stream.split();
        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            let mut write = write;
            while let Some(message) = ws_rx.recv().await {
                if write.send(message).await.is_err() {
                    break;
                }
            }
        });

        // Login announces the client tag; the server echoes back the
        // assigned identity.
        self.send_signal(
            &ws_tx,
            &SignalMessage::Login {
                user_id: self.config.signaling.client_tag.clone(),
            },
        );

        let mut heartbeat = Heartbeat::new(
            Duration::from_millis(self.config.heartbeat.interval_ms),
            Duration::from_millis(self.config.heartbeat.timeout_ms),
        );
        let mut ticker = tokio::time::interval(heartbeat.interval());
        let (chan_tx, mut chan_rx) = mpsc::unbounded_channel::<bool>();

        self.set_phase(SessionPhase::Idle);

        let exit = loop {
            tokio::select! {
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        self.handle_signal(&mut ctx, &ws_tx, &chan_tx, &mut heartbeat, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break SessionExit::Restart("signaling socket closed");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("signaling socket error: {}", e);
                        break SessionExit::Restart("signaling socket error");
                    }
                },
                _ = ticker.tick() => {
                    self.send_signal(&ws_tx, &SignalMessage::Ping { ts: unix_millis() });
                    if heartbeat.poll(Instant::now()) {
                        break SessionExit::Restart("heartbeat timeout");
                    }
                },
                Some(open) = chan_rx.recv() => {
                    let _ = self.events.send(SessionEvent::ChannelState { open });
                },
                command = self.commands.recv() => match command {
                    None => break SessionExit::Shutdown,
                    Some(command) => {
                        if let Some(exit) = self.handle_command(&mut ctx, &ws_tx, command).await {
                            break exit;
                        }
                    }
                },
            }
        };

        self.teardown(&mut ctx).await;
        writer.abort();
        exit
    }

    async fn handle_signal(
        &self,
        ctx: &mut SessionContext,
        ws_tx: &mpsc::UnboundedSender<Message>,
        chan_tx: &mpsc::UnboundedSender<bool>,
        heartbeat: &mut Heartbeat,
        text: &str,
    ) {
        let message = match SignalMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("rejecting signaling message: {}", e);
                return;
            }
        };

        // Heartbeat acks never reach the general dispatcher.
        if let SignalMessage::Pong { .. } = message {
            heartbeat.on_ack(Instant::now());
            return;
        }

        match message {
            SignalMessage::Login { user_id } => {
                ctx.client_id = user_id
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                info!("logged in as {}", ctx.client_id);
            }
            SignalMessage::Offer { sdp, .. } => {
                if let Err(e) = self.handle_offer(ctx, ws_tx, chan_tx, &sdp).await {
                    error!("negotiation failed: {}", e);
                }
            }
            SignalMessage::NewCandidateMid { candidate, mid, .. } => match &ctx.peer {
                Some(pc) => {
                    if let Err(e) = peer::add_remote_candidate(pc, &candidate, mid.as_deref()).await
                    {
                        warn!("remote ICE candidate rejected: {}", e);
                    }
                }
                None => warn!("dropping ICE candidate: no peer connection"),
            },
            other => debug!("ignoring server-bound signaling message: {:?}", other),
        }
    }

    async fn handle_offer(
        &self,
        ctx: &mut SessionContext,
        ws_tx: &mpsc::UnboundedSender<Message>,
        chan_tx: &mpsc::UnboundedSender<bool>,
        sdp: &str,
    ) -> Result<(), SessionError> {
        self.set_phase(SessionPhase::Negotiating);

        // A superseding offer replaces the connection outright.
        if let Some(old) = ctx.peer.take() {
            warn!("superseding offer received; closing previous peer connection");
            let _ = old.close().await;
        }

        let pc = peer::build_peer_connection(&self.config.ice.servers).await?;
        self.wire_peer(ctx, &pc, ws_tx, chan_tx);

        let answer_sdp = peer::answer_offer(&pc, sdp).await?;
        ctx.peer = Some(pc);

        self.send_signal(
            ws_tx,
            &SignalMessage::Answer {
                transmission_id: ctx.transmission_id.clone(),
                user_id: ctx.client_id.clone(),
                remote_user_id: ctx.transmission_id.clone(),
                sdp: answer_sdp,
            },
        );
        info!("answer sent for transmission {}", ctx.transmission_id);
        Ok(())
    }

    fn wire_peer(
        &self,
        ctx: &SessionContext,
        pc: &Arc<RTCPeerConnection>,
        ws_tx: &mpsc::UnboundedSender<Message>,
        chan_tx: &mpsc::UnboundedSender<bool>,
    ) {
        // Local candidates trickle to the server as they are found.
        let candidate_tx = ws_tx.clone();
        let user_id = ctx.client_id.clone();
        let transmission_id = ctx.transmission_id.clone();
        pc.on_ice_candidate(Box::new(move |candidate| {
            let candidate_tx = candidate_tx.clone();
            let user_id = user_id.clone();
            let transmission_id = transmission_id.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                match candidate.to_json() {
                    Ok(json) => {
                        let message = SignalMessage::NewCandidateMid {
                            transmission_id: transmission_id.clone(),
                            user_id,
                            remote_user_id: transmission_id,
                            candidate: json.candidate,
                            mid: json.sdp_mid,
                        };
                        if let Ok(text) = message.to_json() {
                            let _ = candidate_tx.send(Message::Text(text));
                        }
                    }
                    Err(e) => warn!("failed to serialize local ICE candidate: {}", e),
                }
            })
        }));

        // Inbound video tracks attach to the render surface; each track
        // id is registered as a selectable display source exactly once.
        let surface = self.surface.clone();
        let displays = ctx.displays.clone();
        let events = self.events.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let surface = surface.clone();
            let displays = displays.clone();
            let events = events.clone();
            Box::pin(async move {
                if track.kind() != RTPCodecType::Video {
                    return;
                }
                let track_id = track.id();
                info!("video track attached: {}", track_id);
                surface.attach_track(&track_id);
                if displays.lock().insert(track_id.clone()) {
                    let _ = events.send(SessionEvent::DisplayAdded(track_id));
                }
            })
        }));

        // The host creates the data channel; bind it as it arrives.
        let transport = self.transport.clone();
        let state_tx = chan_tx.clone();
        pc.on_data_channel(Box::new(move |channel| {
            let transport = transport.clone();
            let state_tx = state_tx.clone();
            Box::pin(async move {
                info!("data channel received: {}", channel.label());
                transport.bind(channel, state_tx);
            })
        }));

        let status = self.status.clone();
        let events = self.events.clone();
        pc.on_ice_connection_state_change(Box::new(move |state| {
            let status = status.clone();
            let events = events.clone();
            Box::pin(async move {
                info!("ICE connection state: {}", state);
                let connected = state == RTCIceConnectionState::Connected;
                status.set_ice_state(state.to_string(), connected);
                if connected && status.set_phase(SessionPhase::Connected) {
                    let _ = events.send(SessionEvent::PhaseChanged(SessionPhase::Connected));
                }
                let _ = events.send(SessionEvent::IceState(state.to_string()));
                let _ = events.send(SessionEvent::ConnectedIndicator(connected));
            })
        }));

        let status = self.status.clone();
        let events = self.events.clone();
        pc.on_signaling_state_change(Box::new(move |state| {
            let status = status.clone();
            let events = events.clone();
            Box::pin(async move {
                debug!("signaling state: {}", state);
                status.set_signaling_state(state.to_string());
                let _ = events.send(SessionEvent::SignalingState(state.to_string()));
            })
        }));
    }

    async fn handle_command(
        &self,
        ctx: &mut SessionContext,
        ws_tx: &mpsc::UnboundedSender<Message>,
        command: ClientCommand,
    ) -> Option<SessionExit> {
        match command {
            ClientCommand::Connect {
                transmission_id,
                password,
            } => {
                ctx.transmission_id = transmission_id.clone();
                self.set_phase(SessionPhase::Negotiating);
                self.send_signal(
                    ws_tx,
                    &SignalMessage::JoinTransmission {
                        user_id: ctx.client_id.clone(),
                        transmission_id: format!("{}@{}", transmission_id, password),
                    },
                );
                None
            }
            ClientCommand::Disconnect => {
                self.send_leave(ctx, ws_tx);
                self.teardown(ctx).await;
                self.set_phase(SessionPhase::Idle);
                None
            }
            ClientCommand::SetAudioCapture(enabled) => {
                self.transport.send(&RemoteAction::audio_capture(enabled));
                None
            }
            ClientCommand::SetDisplay(id) => {
                self.transport.send(&RemoteAction::display_id(id));
                None
            }
            ClientCommand::SendRaw(raw) => {
                match validate_manual_action(&raw) {
                    Ok(action) => {
                        self.transport.send(&action);
                    }
                    Err(e) => {
                        warn!("manual action rejected: {}", e);
                        let _ = self
                            .events
                            .send(SessionEvent::ManualActionRejected(e.to_string()));
                    }
                }
                None
            }
            ClientCommand::Shutdown => {
                self.send_leave(ctx, ws_tx);
                Some(SessionExit::Shutdown)
            }
        }
    }

    /// Stop outbound senders, close the peer connection, clear the
    /// surface binding and reset the status mirrors. A second call
    /// with nothing left to tear down is a no-op.
    async fn teardown(&self, ctx: &mut SessionContext) {
        let Some(pc) = ctx.peer.take() else { return };

        for sender in pc.get_senders().await {
            let _ = sender.stop().await;
        }
        if let Err(e) = pc.close().await {
            warn!("peer connection close failed: {}", e);
        }

        self.transport.unbind();
        self.surface.clear();
        self.status.reset();
        let _ = self.events.send(SessionEvent::IceState(String::new()));
        let _ = self.events.send(SessionEvent::SignalingState(String::new()));
        let _ = self.events.send(SessionEvent::ConnectedIndicator(false));
        let _ = self.events.send(SessionEvent::ChannelState { open: false });
        info!("session {} torn down", ctx.id);
    }

    fn send_leave(&self, ctx: &SessionContext, ws_tx: &mpsc::UnboundedSender<Message>) {
        if ctx.transmission_id.is_empty() {
            return;
        }
        self.send_signal(
            ws_tx,
            &SignalMessage::LeaveTransmission {
                user_id: ctx.client_id.clone(),
                transmission_id: ctx.transmission_id.clone(),
            },
        );
    }

    fn send_signal(&self, ws_tx: &mpsc::UnboundedSender<Message>, message: &SignalMessage) {
        match message.to_json() {
            Ok(text) => {
                let _ = ws_tx.send(Message::Text(text));
            }
            Err(e) => warn!("failed to encode signaling message: {}", e),
        }
    }

    fn set_phase(&self, phase: SessionPhase) {
        if self.status.set_phase(phase) {
            debug!("session phase: {}", phase.as_str());
            let _ = self.events.send(SessionEvent::PhaseChanged(phase));
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::NullSurface;

    fn test_config() -> Arc<Config> {
        Arc::new(Config::default())
    }

    #[tokio::test]
    async fn manual_action_rejection_is_reported() {
        let (client, _handle, mut events) =
            SessionClient::new(test_config(), Arc::new(NullSurface));
        let mut ctx = SessionContext::new();
        let (ws_tx, _ws_rx) = mpsc::unbounded_channel();

        let exit = client
            .handle_command(&mut ctx, &ws_tx, ClientCommand::SendRaw("{\"foo\":1}".into()))
            .await;
        assert!(exit.is_none());
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::ManualActionRejected(_))
        ));
    }

    #[tokio::test]
    async fn valid_manual_action_is_sent_best_effort() {
        let (client, handle, _events) =
            SessionClient::new(test_config(), Arc::new(NullSurface));
        let mut ctx = SessionContext::new();
        let (ws_tx, _ws_rx) = mpsc::unbounded_channel();

        let raw = r#"{"type":0,"mouse":{"x":0.5,"y":0.5,"s":0,"flag":0}}"#.to_string();
        client
            .handle_command(&mut ctx, &ws_tx, ClientCommand::SendRaw(raw))
            .await;
        // No channel bound: the action is dropped, not an error.
        assert_eq!(handle.transport().dropped(), 1);
    }

    #[tokio::test]
    async fn connect_sends_combined_join_token() {
        let (client, _handle, _events) =
            SessionClient::new(test_config(), Arc::new(NullSurface));
        let mut ctx = SessionContext::new();
        ctx.client_id = "web".to_string();
        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel();

        client
            .handle_command(
                &mut ctx,
                &ws_tx,
                ClientCommand::Connect {
                    transmission_id: "123456".to_string(),
                    password: "secret".to_string(),
                },
            )
            .await;

        let Some(Message::Text(text)) = ws_rx.recv().await else {
            panic!("expected join message");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "join_transmission");
        assert_eq!(value["transmission_id"], "123456@secret");
        assert_eq!(value["user_id"], "web");
        assert_eq!(ctx.transmission_id, "123456");
    }

    #[tokio::test]
    async fn login_echo_sets_local_identity() {
        let (client, _handle, _events) =
            SessionClient::new(test_config(), Arc::new(NullSurface));
        let mut ctx = SessionContext::new();
        let (ws_tx, _ws_rx) = mpsc::unbounded_channel();
        let (chan_tx, _chan_rx) = mpsc::unbounded_channel();
        let mut heartbeat = Heartbeat::new(Duration::from_secs(3), Duration::from_secs(10));

        client
            .handle_signal(
                &mut ctx,
                &ws_tx,
                &chan_tx,
                &mut heartbeat,
                r#"{"type":"login","user_id":"778899@host-3"}"#,
            )
            .await;
        assert_eq!(ctx.client_id, "778899");
    }

    #[tokio::test]
    async fn pong_feeds_heartbeat_not_dispatcher() {
        let (client, _handle, mut events) =
            SessionClient::new(test_config(), Arc::new(NullSurface));
        let mut ctx = SessionContext::new();
        let (ws_tx, _ws_rx) = mpsc::unbounded_channel();
        let (chan_tx, _chan_rx) = mpsc::unbounded_channel();
        let mut heartbeat = Heartbeat::new(Duration::from_millis(3000), Duration::from_millis(10));

        // Expire, then ack through a pong; the window re-arms.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(heartbeat.poll(Instant::now()));
        client
            .handle_signal(&mut ctx, &ws_tx, &chan_tx, &mut heartbeat, r#"{"type":"pong"}"#)
            .await;
        assert!(!heartbeat.poll(Instant::now()));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn candidates_without_peer_connection_are_dropped() {
        let (client, _handle, _events) =
            SessionClient::new(test_config(), Arc::new(NullSurface));
        let mut ctx = SessionContext::new();
        let (ws_tx, _ws_rx) = mpsc::unbounded_channel();
        let (chan_tx, _chan_rx) = mpsc::unbounded_channel();
        let mut heartbeat = Heartbeat::new(Duration::from_secs(3), Duration::from_secs(10));

        let candidate = r#"{"type":"new_candidate_mid","transmission_id":"1","user_id":"a","remote_user_id":"b","candidate":"candidate:0","mid":"0"}"#;
        client
            .handle_signal(&mut ctx, &ws_tx, &chan_tx, &mut heartbeat, candidate)
            .await;
        assert!(ctx.peer.is_none());
    }

    #[tokio::test]
    async fn malformed_signaling_is_rejected() {
        let (client, _handle, _events) =
            SessionClient::new(test_config(), Arc::new(NullSurface));
        let mut ctx = SessionContext::new();
        let (ws_tx, _ws_rx) = mpsc::unbounded_channel();
        let (chan_tx, _chan_rx) = mpsc::unbounded_channel();
        let mut heartbeat = Heartbeat::new(Duration::from_secs(3), Duration::from_secs(10));

        client
            .handle_signal(&mut ctx, &ws_tx, &chan_tx, &mut heartbeat, r#"{"type":"bogus"}"#)
            .await;
        client
            .handle_signal(&mut ctx, &ws_tx, &chan_tx, &mut heartbeat, "not json")
            .await;
        assert_eq!(ctx.client_id, "000000");
    }

    #[tokio::test]
    async fn double_teardown_is_a_no_op() {
        let (client, _handle, mut events) =
            SessionClient::new(test_config(), Arc::new(NullSurface));
        let mut ctx = SessionContext::new();

        client.teardown(&mut ctx).await;
        client.teardown(&mut ctx).await;
        // No peer connection existed, so no reset events were emitted.
        assert!(events.try_recv().is_err());
    }
}
