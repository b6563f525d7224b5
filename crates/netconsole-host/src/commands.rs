//! Externally triggered actions. The embedder invokes these by name; the
//! handlers resolve their collaborators through the service context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::collections::{CollectionIndex, CollectionSource};
use crate::config::ConfigurationManager;
use crate::context::{RegistryError, ServiceContext};
use crate::views::ViewManager;

pub const CMD_NEW_REQUEST: &str = "netconsole.new-request";
pub const CMD_REFRESH_COLLECTIONS: &str = "netconsole.refresh-collections";
pub const CMD_OPEN_REQUEST_BY_ID: &str = "netconsole.open-request-by-id";

/// Well-known service context keys used by the command handlers.
pub mod service_keys {
    pub const VIEW_MANAGER: &str = "view-manager";
    pub const CONFIGURATION_MANAGER: &str = "configuration-manager";
    pub const COLLECTION_INDEX: &str = "collection-index";
    pub const COLLECTION_SOURCE: &str = "collection-source";
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command \"{0}\" is already registered")]
    AlreadyRegistered(String),
    #[error("unknown command \"{0}\"")]
    Unknown(String),
    #[error("command \"{0}\" requires an argument")]
    MissingArgument(String),
    #[error("could not open a request with an id of \"{0}\"")]
    UnknownEntity(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

type Handler = Arc<dyn Fn(Option<&str>) -> Result<(), CommandError> + Send + Sync>;

#[derive(Default)]
pub struct CommandRegistry {
    handlers: Mutex<HashMap<String, Handler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, handler: Handler) -> Result<(), CommandError> {
        let mut handlers = self.handlers.lock().expect("command map poisoned");
        if handlers.contains_key(name) {
            return Err(CommandError::AlreadyRegistered(name.to_string()));
        }
        handlers.insert(name.to_string(), handler);
        Ok(())
    }

    pub fn invoke(&self, name: &str, argument: Option<&str>) -> Result<(), CommandError> {
        // Run the handler outside the lock so handlers can invoke other
        // commands.
        let handler = {
            let handlers = self.handlers.lock().expect("command map poisoned");
            handlers
                .get(name)
                .cloned()
                .ok_or_else(|| CommandError::Unknown(name.to_string()))?
        };
        info!(event = "command_invoked", command = name);
        handler(argument)
    }
}

/// Registers the three console commands against the given context. The
/// context must already hold the view and configuration managers.
pub fn register_commands(
    registry: &CommandRegistry,
    ctx: Arc<ServiceContext>,
) -> Result<(), CommandError> {
    let new_ctx = ctx.clone();
    registry.register(
        CMD_NEW_REQUEST,
        Arc::new(move |_| {
            let views: Arc<ViewManager> = new_ctx.require(service_keys::VIEW_MANAGER)?;
            let config: Arc<ConfigurationManager> =
                new_ctx.require(service_keys::CONFIGURATION_MANAGER)?;
            if config.snapshot().open_frontend_in_multiple_tabs {
                views.construct_multitab_view();
            } else {
                views.activate_singleton();
            }
            Ok(())
        }),
    )?;

    let refresh_ctx = ctx.clone();
    registry.register(
        CMD_REFRESH_COLLECTIONS,
        Arc::new(move |_| {
            let index: Arc<CollectionIndex> = refresh_ctx
                .get_or_create(service_keys::COLLECTION_INDEX, || {
                    Arc::new(CollectionIndex::new())
                })?;
            // No discovery source wired means nothing to refresh from.
            if let Some(source) = refresh_ctx
                .get::<Box<dyn CollectionSource>>(service_keys::COLLECTION_SOURCE)
            {
                index.refresh(source.as_ref().as_ref());
            }
            Ok(())
        }),
    )?;

    registry.register(
        CMD_OPEN_REQUEST_BY_ID,
        Arc::new(move |argument| {
            let id = argument
                .ok_or_else(|| CommandError::MissingArgument(CMD_OPEN_REQUEST_BY_ID.to_string()))?;
            let index: Arc<CollectionIndex> =
                ctx.get_or_create(service_keys::COLLECTION_INDEX, || {
                    Arc::new(CollectionIndex::new())
                })?;
            let item = index
                .get_item(id)
                .ok_or_else(|| CommandError::UnknownEntity(id.to_string()))?;
            let views: Arc<ViewManager> = ctx.require(service_keys::VIEW_MANAGER)?;
            views.activate_or_create_tab(id, item.request);
            Ok(())
        }),
    )?;

    Ok(())
}
