//! Host side of the embedded network console: tab controllers mediating
//! typed message traffic between sandboxed request-builder surfaces and the
//! trusted execution layer.

pub mod bridge;
pub mod collections;
pub mod commands;
pub mod config;
pub mod context;
pub mod executor;
pub mod hooks;
pub mod surface;
pub mod tab;
pub mod theme;
pub mod views;

pub use bridge::{BridgeError, SocketNotice, WebsocketBridge};
pub use collections::{Collection, CollectionIndex, CollectionItem, CollectionSource};
pub use commands::{register_commands, CommandError, CommandRegistry};
pub use config::{ConfigurationManager, ConsoleConfig};
pub use context::{RegistryError, ServiceContext};
pub use executor::{ExecutorError, HttpExecutor, RequestExecutor, SUPPORTED_VERBS};
pub use hooks::{NoopHooks, PersistenceHooks};
pub use surface::{ChannelSurface, Surface, SurfaceShell};
pub use tab::{HostAction, TabController, TabDeps, TabEvent, TabHandle};
pub use theme::{ThemeProvider, ThemeStore};
pub use views::ViewManager;
