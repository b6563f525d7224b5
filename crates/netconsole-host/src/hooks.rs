use netconsole_protocol::{AuthorizationDescriptor, EnvironmentVariable, RequestDescriptor};

/// Editor-side persistence collaborators. The console keeps working when the
/// embedder wires none of these up, so every method defaults to a no-op.
#[allow(unused_variables)]
pub trait PersistenceHooks: Send + Sync {
    fn save_request(&self, request: &RequestDescriptor, request_id: Option<&str>) {}

    fn save_collection_authorization(
        &self,
        collection_id: &str,
        authorization: &AuthorizationDescriptor,
    ) {
    }

    fn save_environment_variables(&self, variables: &[EnvironmentVariable]) {}

    fn open_web_link(&self, url: &str) {}

    fn update_dirty_flag(&self, request_id: Option<&str>, is_dirty: bool) {}
}

pub struct NoopHooks;

impl PersistenceHooks for NoopHooks {}
