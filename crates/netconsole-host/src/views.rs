//! View manager: creates and tracks tab controllers, routing between the
//! one-shared-tab mode and the tab-per-request mode.

use netconsole_protocol::{RequestDescriptor, ThemeSnapshot};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ConfigurationManager;
use crate::surface::SurfaceShell;
use crate::tab::{HostAction, TabController, TabDeps, TabHandle};

pub struct ViewManager {
    shell: Arc<dyn SurfaceShell>,
    deps: TabDeps,
    config: Arc<ConfigurationManager>,
    singleton: Mutex<Option<TabHandle>>,
    by_request: Arc<Mutex<HashMap<String, TabHandle>>>,
    all_tabs: Mutex<Vec<TabHandle>>,
}

impl ViewManager {
    pub fn new(
        shell: Arc<dyn SurfaceShell>,
        deps: TabDeps,
        config: Arc<ConfigurationManager>,
    ) -> Self {
        Self {
            shell,
            deps,
            config,
            singleton: Mutex::new(None),
            by_request: Arc::new(Mutex::new(HashMap::new())),
            all_tabs: Mutex::new(Vec::new()),
        }
    }

    /// The one process-lifetime tab. Created on first call, reused and
    /// revealed afterwards; never closable from the frontend side.
    pub fn activate_singleton(&self) -> TabHandle {
        let mut singleton = self.singleton.lock().expect("singleton lock poisoned");
        if let Some(existing) = singleton.as_ref() {
            if !existing.is_closed() {
                existing.host(HostAction::Reveal);
                return existing.clone();
            }
        }

        let handle = self.spawn_tab("Network Console", false);
        *singleton = Some(handle.clone());
        handle
    }

    /// A fresh tab bound to exactly one request.
    pub fn construct_multitab_view(&self) -> TabHandle {
        self.spawn_tab("Network Console", true)
    }

    /// Reveals the tab mapped to `id`, or creates one and loads the
    /// descriptor into it. Deliberately does nothing when multi-tab mode is
    /// off; singleton mode routes everything through `activate_singleton`.
    pub fn activate_or_create_tab(&self, id: &str, descriptor: RequestDescriptor) {
        if !self.config.snapshot().open_frontend_in_multiple_tabs {
            debug!(event = "activate_by_id_skipped", entity_id = %id);
            return;
        }

        let existing = {
            let map = self.by_request.lock().expect("request map poisoned");
            map.get(id).filter(|tab| !tab.is_closed()).cloned()
        };
        if let Some(tab) = existing {
            tab.host(HostAction::ShowOpenRequest {
                request_id: id.to_string(),
            });
            return;
        }

        let tab = self.construct_multitab_view();
        self.by_request
            .lock()
            .expect("request map poisoned")
            .insert(id.to_string(), tab.clone());
        tab.host(HostAction::LoadRequest(descriptor));
    }

    /// Fans a style change out to every live tab; tabs still Booting queue
    /// it like any other outbound message.
    pub fn notify_style_updated(&self, theme: ThemeSnapshot) {
        let mut tabs = self.all_tabs.lock().expect("tab list poisoned");
        tabs.retain(|tab| !tab.is_closed());
        for tab in tabs.iter() {
            tab.host(HostAction::StyleUpdated(theme.clone()));
        }
    }

    pub fn dispose_all(&self) {
        let tabs = {
            let mut list = self.all_tabs.lock().expect("tab list poisoned");
            std::mem::take(&mut *list)
        };
        for tab in tabs {
            tab.dispose();
        }
        self.singleton.lock().expect("singleton lock poisoned").take();
        self.by_request
            .lock()
            .expect("request map poisoned")
            .clear();
    }

    pub fn open_tab_count(&self) -> usize {
        let mut tabs = self.all_tabs.lock().expect("tab list poisoned");
        tabs.retain(|tab| !tab.is_closed());
        tabs.len()
    }

    fn spawn_tab(&self, title: &str, single_request_mode: bool) -> TabHandle {
        let tab_id = Uuid::new_v4().to_string();
        let surface = self.shell.create_surface(title);

        // Tabs that start unattached report their generated request id back
        // so open-by-id can find them later.
        let by_request = self.by_request.clone();
        let linker = Arc::new(move |request_id: String, handle: TabHandle| {
            by_request
                .lock()
                .expect("request map poisoned")
                .insert(request_id, handle);
        });

        let handle = TabController::spawn(
            tab_id.clone(),
            surface,
            self.deps.clone(),
            single_request_mode,
            Some(linker),
        );
        self.all_tabs
            .lock()
            .expect("tab list poisoned")
            .push(handle.clone());
        info!(event = "view_opened", tab_id = %tab_id, single_request_mode);
        handle
    }
}
