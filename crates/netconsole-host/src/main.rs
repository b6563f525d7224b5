//! Stdio embedder: serves one console tab over newline-delimited JSON.
//! Frontend messages arrive on stdin; host messages leave on stdout.

use anyhow::Context;
use clap::Parser;
use netconsole_host::commands::{register_commands, service_keys, CommandRegistry};
use netconsole_host::config::ConfigurationManager;
use netconsole_host::context::ServiceContext;
use netconsole_host::executor::HttpExecutor;
use netconsole_host::hooks::NoopHooks;
use netconsole_host::surface::{Surface, SurfaceShell};
use netconsole_host::tab::TabDeps;
use netconsole_host::theme::ThemeStore;
use netconsole_host::views::ViewManager;
use netconsole_protocol::{encode_frame, FrameDecoder, DEFAULT_MAX_FRAME_BYTES};
use netconsole_protocol::{FrontendMessage, HostMessage, ThemeSnapshot};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "netconsole-host")]
struct Args {
    /// Settings JSON file (camelCase keys, all optional).
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Report a dark editor theme to the frontend.
    #[arg(long)]
    dark: bool,
    #[arg(long)]
    debug: bool,
}

struct StdioSurface {
    tx: mpsc::UnboundedSender<HostMessage>,
}

impl Surface for StdioSurface {
    fn deliver(&self, message: HostMessage) {
        let _ = self.tx.send(message);
    }
}

struct StdioShell {
    tx: mpsc::UnboundedSender<HostMessage>,
}

impl SurfaceShell for StdioShell {
    fn create_surface(&self, _title: &str) -> Arc<dyn Surface> {
        Arc::new(StdioSurface {
            tx: self.tx.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(match &args.settings {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading settings file {}", path.display()))?;
            let settings = serde_json::from_str(&raw)
                .with_context(|| format!("parsing settings file {}", path.display()))?;
            ConfigurationManager::from_settings(&settings)
        }
        None => ConfigurationManager::default(),
    });

    let theme = Arc::new(ThemeStore::new(ThemeSnapshot {
        css_variables: String::new(),
        is_dark: args.dark,
        is_high_contrast: false,
    }));

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<HostMessage>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = out_rx.recv().await {
            let frame = match encode_frame(&message, DEFAULT_MAX_FRAME_BYTES) {
                Ok(frame) => frame,
                Err(err) => {
                    error!(event = "frame_encode_failed", error = %err);
                    continue;
                }
            };
            if stdout.write_all(&frame).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let deps = TabDeps {
        theme,
        executor: Arc::new(HttpExecutor::new(config.clone())),
        hooks: Arc::new(NoopHooks),
    };
    let views = Arc::new(ViewManager::new(
        Arc::new(StdioShell { tx: out_tx }),
        deps,
        config.clone(),
    ));

    let ctx = Arc::new(ServiceContext::new());
    ctx.register(service_keys::VIEW_MANAGER, views.clone())?;
    ctx.register(service_keys::CONFIGURATION_MANAGER, config)?;
    let registry = CommandRegistry::new();
    register_commands(&registry, ctx)?;

    // One surface on stdio means one tab: the singleton.
    let tab = views.activate_singleton();
    info!(event = "stdio_console_started", tab_id = %tab.tab_id());

    let mut stdin = tokio::io::stdin();
    let mut decoder = FrameDecoder::<FrontendMessage>::default();
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        tokio::select! {
            read = stdin.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => {
                    for decoded in decoder.push_chunk(&buf[..n]) {
                        match decoded {
                            Ok(message) => tab.frontend(message),
                            Err(err) => warn!(event = "frame_decode_failed", error = %err),
                        }
                    }
                }
                Err(err) => {
                    error!(event = "stdin_read_failed", error = %err);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!(event = "interrupted");
                break;
            }
        }
    }

    views.dispose_all();
    // The registry's handlers hold the context, which holds the view
    // manager and with it the stdout sender; release the whole chain so the
    // writer can drain and exit.
    drop(registry);
    drop(views);
    let _ = writer.await;
    Ok(())
}
