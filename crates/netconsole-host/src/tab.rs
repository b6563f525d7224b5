//! Tab controller: mediates all traffic for one presentation surface,
//! enforces the readiness handshake, and multiplexes websocket bridges.

use netconsole_protocol::{
    FrontendMessage, HostMessage, RequestDescriptor, ResponseOutcome, ThemeSnapshot,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::bridge::{SocketNotice, WebsocketBridge};
use crate::executor::RequestExecutor;
use crate::hooks::PersistenceHooks;
use crate::surface::Surface;
use crate::theme::ThemeProvider;

/// Everything that can land in a tab's inbox. One task drains it, so tab
/// state never needs a lock.
#[derive(Debug)]
pub enum TabEvent {
    Frontend(FrontendMessage),
    Host(HostAction),
    ExecutionFinished {
        id: u64,
        outcome: Result<ResponseOutcome, String>,
    },
    Socket(SocketNotice),
    Dispose,
}

/// Host-initiated operations on a tab.
#[derive(Debug)]
pub enum HostAction {
    InitNewEmptyRequest,
    LoadRequest(RequestDescriptor),
    CloseView { request_id: String },
    ShowOpenRequest { request_id: String },
    StyleUpdated(ThemeSnapshot),
    /// Foregrounds the surface without any message to the frontend.
    Reveal,
}

/// Outbound delivery mode. The queue exists only until the first readiness
/// signal; the Booting→Ready transition drops it for good.
enum DeliveryState {
    Booting { queue: VecDeque<HostMessage> },
    Ready,
}

/// Collaborators a tab needs; shared across every tab the view manager
/// creates.
#[derive(Clone)]
pub struct TabDeps {
    pub theme: Arc<dyn ThemeProvider>,
    pub executor: Arc<dyn RequestExecutor>,
    pub hooks: Arc<dyn PersistenceHooks>,
}

/// Called when a non-single-request tab reports a freshly generated request
/// id, so the view manager can make the tab addressable by that id.
pub type RequestLinker = Arc<dyn Fn(String, TabHandle) + Send + Sync>;

/// Cloneable address of a running tab.
#[derive(Clone)]
pub struct TabHandle {
    tab_id: String,
    events: mpsc::UnboundedSender<TabEvent>,
}

impl TabHandle {
    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn frontend(&self, message: FrontendMessage) {
        let _ = self.events.send(TabEvent::Frontend(message));
    }

    pub fn host(&self, action: HostAction) {
        let _ = self.events.send(TabEvent::Host(action));
    }

    pub fn dispose(&self) {
        let _ = self.events.send(TabEvent::Dispose);
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

pub struct TabController {
    tab_id: String,
    surface: Arc<dyn Surface>,
    deps: TabDeps,
    events: mpsc::UnboundedSender<TabEvent>,
    handle: TabHandle,
    delivery: DeliveryState,
    /// Acquisition-ordered so teardown can release in reverse.
    bridges: Vec<WebsocketBridge>,
    /// Monotonic per-tab counter stamped on each bridge, so notices from a
    /// replaced bridge cannot be mistaken for its replacement's.
    bridge_seq: u64,
    single_request_mode: bool,
    attached_request_id: Option<String>,
    linker: Option<RequestLinker>,
}

impl TabController {
    /// Spawns the tab task and returns its handle. The tab starts in
    /// Booting; nothing reaches the surface until CONSOLE_READY arrives.
    pub fn spawn(
        tab_id: String,
        surface: Arc<dyn Surface>,
        deps: TabDeps,
        single_request_mode: bool,
        linker: Option<RequestLinker>,
    ) -> TabHandle {
        let (events, inbox) = mpsc::unbounded_channel();
        let handle = TabHandle {
            tab_id: tab_id.clone(),
            events: events.clone(),
        };
        let controller = Self {
            tab_id: tab_id.clone(),
            surface,
            deps,
            events,
            handle: handle.clone(),
            delivery: DeliveryState::Booting {
                queue: VecDeque::new(),
            },
            bridges: Vec::new(),
            bridge_seq: 0,
            single_request_mode,
            attached_request_id: None,
            linker,
        };
        info!(event = "tab_created", tab_id = %tab_id, single_request_mode);
        tokio::spawn(controller.run(inbox));
        handle
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<TabEvent>) {
        while let Some(event) = inbox.recv().await {
            match event {
                TabEvent::Frontend(message) => self.handle_frontend(message),
                TabEvent::Host(action) => self.handle_host(action),
                TabEvent::ExecutionFinished { id, outcome } => {
                    self.handle_execution_finished(id, outcome)
                }
                TabEvent::Socket(notice) => self.handle_socket(notice),
                TabEvent::Dispose => break,
            }
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        // Reverse acquisition order, same as scoped drop would give.
        while let Some(bridge) = self.bridges.pop() {
            bridge.disconnect();
        }
        info!(event = "tab_disposed", tab_id = %self.tab_id);
    }

    /// Queued while Booting, direct once Ready.
    fn post(&mut self, message: HostMessage) {
        match &mut self.delivery {
            DeliveryState::Booting { queue } => queue.push_back(message),
            DeliveryState::Ready => self.surface.deliver(message),
        }
    }

    fn handle_frontend(&mut self, message: FrontendMessage) {
        match message {
            FrontendMessage::ConsoleReady => self.on_console_ready(),
            FrontendMessage::ExecuteRequest {
                id,
                configuration,
                authorization,
            } => self.on_execute_request(id, configuration, authorization),
            FrontendMessage::SaveRequest {
                request,
                request_id,
            } => self.deps.hooks.save_request(&request, request_id.as_deref()),
            FrontendMessage::SaveCollectionAuthorizationParameters {
                collection_id,
                authorization,
            } => self
                .deps
                .hooks
                .save_collection_authorization(&collection_id, &authorization),
            FrontendMessage::SaveEnvironmentVariables { variables } => {
                self.deps.hooks.save_environment_variables(&variables)
            }
            FrontendMessage::OpenWebLink { url } => self.deps.hooks.open_web_link(&url),
            FrontendMessage::UpdateDirtyFlag {
                request_id,
                is_dirty,
            } => self
                .deps
                .hooks
                .update_dirty_flag(request_id.as_deref(), is_dirty),
            FrontendMessage::OpenNewUnattachedRequest { request_id } => {
                self.on_open_new_unattached_request(request_id)
            }
            FrontendMessage::DisconnectWebsocket { request_id } => {
                match self.find_bridge(&request_id) {
                    Some(bridge) => bridge.disconnect(),
                    // Already gone; benign race, not a failure.
                    None => debug!(event = "bridge_absent", tab_id = %self.tab_id, request_id = %request_id),
                }
            }
            FrontendMessage::WebsocketSendMessage {
                request_id,
                message,
                encoding,
            } => match self.find_bridge(&request_id) {
                Some(bridge) => {
                    if let Err(err) = bridge.send(&message, encoding) {
                        error!(event = "bridge_send_failed", tab_id = %self.tab_id, request_id = %request_id, error = %err);
                    }
                }
                None => debug!(event = "bridge_absent", tab_id = %self.tab_id, request_id = %request_id),
            },
            FrontendMessage::Log { details } => {
                info!(event = "frontend_log", tab_id = %self.tab_id, details = ?details)
            }
            FrontendMessage::Unrecognized => {
                warn!(event = "unrecognized_frontend_message", tab_id = %self.tab_id)
            }
        }
    }

    /// Readiness handshake: init reply first, then the Booting backlog in
    /// FIFO order, then direct delivery forever after.
    fn on_console_ready(&mut self) {
        self.surface
            .deliver(HostMessage::InitHost(self.deps.theme.snapshot()));

        let previous = std::mem::replace(&mut self.delivery, DeliveryState::Ready);
        if let DeliveryState::Booting { queue } = previous {
            info!(event = "tab_ready", tab_id = %self.tab_id, queued = queue.len());
            for message in queue {
                self.surface.deliver(message);
            }
        }
    }

    fn on_execute_request(
        &mut self,
        id: u64,
        configuration: RequestDescriptor,
        authorization: netconsole_protocol::AuthorizationDescriptor,
    ) {
        if is_websocket_url(&configuration.url) {
            self.open_websocket(id, &configuration.url);
            return;
        }

        let executor = self.deps.executor.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = executor
                .execute(&configuration, &authorization)
                .await
                .map_err(|err| err.to_string());
            let _ = events.send(TabEvent::ExecutionFinished { id, outcome });
        });
    }

    /// Websocket execute: the bridge is created and the completion answered
    /// right away with a synthetic 101, without waiting for the socket.
    fn open_websocket(&mut self, id: u64, url: &str) {
        let request_id = self
            .attached_request_id
            .clone()
            .unwrap_or_else(|| id.to_string());

        if let Some(position) = self
            .bridges
            .iter()
            .position(|b| b.request_id() == request_id)
        {
            // A request is never reused across sockets; drop the stale one.
            let stale = self.bridges.remove(position);
            stale.disconnect();
            warn!(event = "bridge_replaced", tab_id = %self.tab_id, request_id = %request_id);
        }

        let generation = self.bridge_seq;
        self.bridge_seq += 1;
        let mut bridge = WebsocketBridge::new(
            url.to_string(),
            request_id.clone(),
            generation,
            self.events.clone(),
        );
        bridge.connect();
        self.bridges.push(bridge);
        info!(event = "bridge_opened", tab_id = %self.tab_id, request_id = %request_id);

        self.post(HostMessage::RequestComplete {
            id,
            result: Some(ResponseOutcome::websocket_upgrade()),
            error: None,
        });
    }

    fn on_open_new_unattached_request(&mut self, request_id: String) {
        if self.single_request_mode {
            info!(event = "tab_attached", tab_id = %self.tab_id, request_id = %request_id);
            self.attached_request_id = Some(request_id);
        } else if let Some(linker) = &self.linker {
            linker(request_id, self.handle.clone());
        }
    }

    fn handle_execution_finished(&mut self, id: u64, outcome: Result<ResponseOutcome, String>) {
        let message = match outcome {
            Ok(result) => HostMessage::RequestComplete {
                id,
                result: Some(result),
                error: None,
            },
            Err(error) => HostMessage::RequestComplete {
                id,
                result: None,
                error: Some(error),
            },
        };
        self.post(message);
    }

    fn handle_host(&mut self, action: HostAction) {
        match action {
            HostAction::InitNewEmptyRequest => self.post(HostMessage::InitNewEmptyRequest),
            HostAction::LoadRequest(request) => self.post(HostMessage::LoadRequest { request }),
            HostAction::CloseView { request_id } => {
                if !self.single_request_mode {
                    self.post(HostMessage::CloseView { request_id });
                }
            }
            HostAction::ShowOpenRequest { request_id } => {
                self.surface.reveal();
                if !self.single_request_mode {
                    self.post(HostMessage::ShowOpenRequest { request_id });
                }
            }
            HostAction::StyleUpdated(theme) => self.post(HostMessage::CssStyleUpdated(theme)),
            HostAction::Reveal => self.surface.reveal(),
        }
    }

    fn handle_socket(&mut self, notice: SocketNotice) {
        match notice {
            SocketNotice::Connected { request_id } => {
                self.post(HostMessage::WebsocketConnected { request_id })
            }
            SocketNotice::Packet {
                request_id,
                data,
                encoding,
                direction,
                elapsed_ms,
            } => self.post(HostMessage::WebsocketPacket {
                request_id,
                data,
                encoding,
                direction,
                elapsed_ms,
            }),
            SocketNotice::Disconnected {
                request_id,
                generation,
            } => {
                let position = self.bridges.iter().position(|b| {
                    b.request_id() == request_id && b.generation() == generation
                });
                match position {
                    Some(index) => {
                        self.bridges.remove(index);
                        self.post(HostMessage::WebsocketDisconnected { request_id });
                    }
                    // Exit of a bridge that was already replaced or torn
                    // down; the frontend must not hear about it.
                    None => {
                        debug!(event = "stale_bridge_exit", tab_id = %self.tab_id, request_id = %request_id, generation)
                    }
                }
            }
        }
    }

    fn find_bridge(&self, request_id: &str) -> Option<&WebsocketBridge> {
        self.bridges.iter().find(|b| b.request_id() == request_id)
    }
}

fn is_websocket_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "ws" | "wss"),
        Err(_) => false,
    }
}
