//! The per-connection actor (spec.md §4.1). `actix-web-actors` has no
//! direct precedent elsewhere in this codebase — this module is written in
//! idiomatic Rust without corpus grounding for the `ws::Actor` mechanics
//! specifically (see DESIGN.md); the surrounding HTTP bootstrap and
//! graceful-shutdown pattern are grounded on
//! `web_service::server::WebService`.

use crate::state::{AppState, TransportEntry};
use crate::wire::{InboundFrame, MessageData, OutboundFrame};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message, StreamHandler};
use actix_web_actors::ws;
use deploy_core::defaults::{HEARTBEAT_INTERVAL, RECEIVE_IDLE_TIMEOUT};
use deploy_core::{EnvVar, SessionId};
use std::sync::Arc;
use std::time::Instant;

/// Sent to a transport actor to ask it to close normally because a newer
/// transport for the same session has just been installed.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseGracefully;

/// Delivered by the orchestrator's event sink when something happens that
/// must reach the client as an outbound frame. `Err(())` signals the
/// transport is past its close handshake but the actor mailbox is still
/// alive — the §4.1 "not in a sendable state" failure reason.
#[derive(Message)]
#[rtype(result = "Result<(), ()>")]
pub struct SendFrame(pub OutboundFrame);

pub struct ClientSession {
    state: Arc<AppState>,
    conn_id: uuid::Uuid,
    session_id: Option<SessionId>,
    last_heard: Instant,
    closing: bool,
}

impl ClientSession {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            conn_id: uuid::Uuid::new_v4(),
            closing: false,
            session_id: None,
            last_heard: Instant::now(),
        }
    }

    fn start_init_timeout(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_later(deploy_core::defaults::INIT_FRAME_TIMEOUT, |act, ctx| {
            if act.session_id.is_none() {
                tracing::warn!("closing connection: no init frame within timeout");
                ctx.stop();
            }
        });
    }

    /// Heartbeat loop (spec.md §4.1): while live, send a `ping` frame every
    /// 30s. A receive-idle period past `RECEIVE_IDLE_TIMEOUT` is
    /// informational only (spec.md: "receive idle 60 s (non-fatal)") — the
    /// ping itself is what prompts a live client to respond, so idle past
    /// that window is logged, not treated as a reason to close.
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if act.last_heard.elapsed() > RECEIVE_IDLE_TIMEOUT {
                tracing::debug!(session_id = ?act.session_id, "connection idle past receive timeout, still alive");
            }
            ctx.text(OutboundFrame::ping().to_json());
        });
    }

    fn dispatch(&mut self, frame: InboundFrame, ctx: &mut ws::WebsocketContext<Self>) {
        match frame {
            InboundFrame::Init { session_id, instance_id, is_reconnect } => {
                self.handle_init(session_id, instance_id, is_reconnect, ctx);
            }
            InboundFrame::Message { message, metadata } => self.handle_message(message, metadata, ctx),
            InboundFrame::EnvVarsUploaded { variables, .. } => self.handle_env_vars(variables, ctx),
            InboundFrame::Pong => {}
        }
    }

    fn handle_init(&mut self, session_id: String, _instance_id: String, is_reconnect: bool, ctx: &mut ws::WebsocketContext<Self>) {
        let session_id = SessionId::from(session_id);
        tracing::info!(session_id = %session_id, is_reconnect, "session init");

        let entry = self.state.orchestrator_for(&session_id, "gateway-user");
        self.state.install_transport(
            session_id.clone(),
            TransportEntry { addr: ctx.address(), conn_id: self.conn_id },
        );

        let state = self.state.clone();
        let sink_session_id = session_id.clone();
        entry.orchestrator.attach_sink(Arc::new(move |event| {
            let state = state.clone();
            let session_id = sink_session_id.clone();
            tokio::spawn(async move {
                crate::forward_orchestrator_event(&state, &session_id, event).await;
            });
        }));

        self.session_id = Some(session_id.clone());
        ctx.text(OutboundFrame::connected(session_id.as_str()).to_json());
    }

    fn handle_message(&mut self, message: String, _metadata: Option<serde_json::Value>, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(session_id) = self.session_id.clone() else {
            ctx.text(OutboundFrame::error("received message before init", "API_ERROR").to_json());
            return;
        };
        let state = self.state.clone();
        tokio::spawn(async move {
            crate::run_turn(state, session_id, message).await;
        });
    }

    fn handle_env_vars(&mut self, variables: Vec<crate::wire::UploadedEnvVar>, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(session_id) = self.session_id.clone() else {
            ctx.text(OutboundFrame::error("received env vars before init", "API_ERROR").to_json());
            return;
        };
        let Some(entry) = self.state.orchestrators.get(&session_id).map(|e| Arc::clone(e.value())) else {
            return;
        };
        let vars: Vec<EnvVar> = variables.into_iter().map(|v| EnvVar::new(v.key, v.value, v.is_secret)).collect();
        let summary = vars
            .iter()
            .map(|v| format!("{}={}", v.key, v.display_value()))
            .collect::<Vec<_>>()
            .join(", ");
        let state = self.state.clone();
        tokio::spawn(async move {
            entry.orchestrator.apply_env_vars(vars).await;
            let frame = OutboundFrame::message(MessageData {
                content: format!("saved environment variables: {summary}"),
                intent: None,
                metadata: None,
            });
            state.send_with_retry(&session_id, frame).await;
        });
    }
}

impl Actor for ClientSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_init_timeout(ctx);
        self.start_heartbeat(ctx);
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> actix::Running {
        if let Some(session_id) = &self.session_id {
            self.state.remove_transport_if_current(session_id, self.conn_id);
        }
        actix::Running::Stop
    }
}

impl Handler<SendFrame> for ClientSession {
    type Result = Result<(), ()>;

    fn handle(&mut self, msg: SendFrame, ctx: &mut Self::Context) -> Self::Result {
        if self.closing {
            return Err(());
        }
        ctx.text(msg.0.to_json());
        Ok(())
    }
}

impl Handler<CloseGracefully> for ClientSession {
    type Result = ();

    fn handle(&mut self, _msg: CloseGracefully, ctx: &mut Self::Context) {
        self.closing = true;
        ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Normal)));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ClientSession {
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match item {
            Ok(msg) => msg,
            Err(_) => {
                ctx.stop();
                return;
            }
        };

        self.last_heard = Instant::now();

        match msg {
            ws::Message::Text(text) => match serde_json::from_str::<InboundFrame>(&text) {
                Ok(frame) => {
                    if self.session_id.is_none() && !matches!(frame, InboundFrame::Init { .. }) {
                        tracing::warn!("first frame was not init; closing handshake");
                        ctx.stop();
                        return;
                    }
                    self.dispatch(frame, ctx);
                }
                Err(err) => {
                    ctx.text(OutboundFrame::error(format!("malformed frame: {err}"), "API_ERROR").to_json());
                }
            },
            ws::Message::Ping(bytes) => ctx.pong(&bytes),
            ws::Message::Pong(_) => {}
            ws::Message::Close(reason) => {
                self.closing = true;
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) | ws::Message::Binary(_) | ws::Message::Nop => {}
        }
    }
}
