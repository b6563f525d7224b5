use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::request::{AuthorizationDescriptor, RequestDescriptor, ResponseOutcome};

/// Explicit payload encoding tag. Never inferred from content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Text,
    Base64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PacketDirection {
    Send,
    Recv,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentVariable {
    pub key: String,
    pub value: String,
}

/// Appearance snapshot delivered with INIT_HOST and on every theme change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSnapshot {
    pub css_variables: String,
    pub is_dark: bool,
    pub is_high_contrast: bool,
}

/// Messages from the presentation surface to the host.
///
/// The set is closed but hosts must outlive frontends: an unknown tag
/// deserializes to `Unrecognized` so newer frontends never crash the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum FrontendMessage {
    #[serde(rename = "CONSOLE_READY")]
    ConsoleReady,
    #[serde(rename = "EXECUTE_REQUEST")]
    ExecuteRequest {
        id: u64,
        configuration: RequestDescriptor,
        #[serde(default)]
        authorization: AuthorizationDescriptor,
    },
    #[serde(rename = "SAVE_REQUEST", rename_all = "camelCase")]
    SaveRequest {
        request: RequestDescriptor,
        #[serde(default)]
        request_id: Option<String>,
    },
    #[serde(
        rename = "SAVE_COLLECTION_AUTHORIZATION_PARAMETERS",
        rename_all = "camelCase"
    )]
    SaveCollectionAuthorizationParameters {
        collection_id: String,
        authorization: AuthorizationDescriptor,
    },
    #[serde(rename = "SAVE_ENVIRONMENT_VARIABLES")]
    SaveEnvironmentVariables { variables: Vec<EnvironmentVariable> },
    #[serde(rename = "OPEN_WEB_LINK")]
    OpenWebLink { url: String },
    #[serde(rename = "UPDATE_DIRTY_FLAG", rename_all = "camelCase")]
    UpdateDirtyFlag {
        #[serde(default)]
        request_id: Option<String>,
        is_dirty: bool,
    },
    #[serde(rename = "OPEN_NEW_UNATTACHED_REQUEST", rename_all = "camelCase")]
    OpenNewUnattachedRequest { request_id: String },
    #[serde(rename = "DISCONNECT_WEBSOCKET", rename_all = "camelCase")]
    DisconnectWebsocket { request_id: String },
    #[serde(rename = "WEBSOCKET_SEND_MESSAGE", rename_all = "camelCase")]
    WebsocketSendMessage {
        request_id: String,
        message: String,
        encoding: PayloadEncoding,
    },
    #[serde(rename = "LOG")]
    Log {
        #[serde(default, flatten)]
        details: HashMap<String, Value>,
    },
    /// Catch-all for tags this host does not know. Logged and dropped.
    #[serde(other)]
    Unrecognized,
}

/// Messages from the host to the presentation surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum HostMessage {
    #[serde(rename = "INIT_HOST")]
    InitHost(ThemeSnapshot),
    #[serde(rename = "CSS_STYLE_UPDATED")]
    CssStyleUpdated(ThemeSnapshot),
    #[serde(rename = "INIT_NEW_EMPTY_REQUEST")]
    InitNewEmptyRequest,
    #[serde(rename = "LOAD_REQUEST")]
    LoadRequest { request: RequestDescriptor },
    #[serde(rename = "CLOSE_VIEW", rename_all = "camelCase")]
    CloseView { request_id: String },
    #[serde(rename = "SHOW_OPEN_REQUEST", rename_all = "camelCase")]
    ShowOpenRequest { request_id: String },
    #[serde(rename = "REQUEST_COMPLETE")]
    RequestComplete {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<ResponseOutcome>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "WEBSOCKET_CONNECTED", rename_all = "camelCase")]
    WebsocketConnected { request_id: String },
    #[serde(rename = "WEBSOCKET_DISCONNECTED", rename_all = "camelCase")]
    WebsocketDisconnected { request_id: String },
    #[serde(rename = "WEBSOCKET_PACKET", rename_all = "camelCase")]
    WebsocketPacket {
        request_id: String,
        data: String,
        encoding: PayloadEncoding,
        direction: PacketDirection,
        elapsed_ms: u64,
    },
}
