use crate::runtime::host::PluginHost;
use crate::runtime::ingest::ConventionPolicy;
use tracing::debug;

/// What is mounted: the plugin, its exact source text and the policy it was read under.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceIdentity {
    plugin_id: String,
    source: Option<String>,
    policy: ConventionPolicy,
}

impl SourceIdentity {
    fn matches(&self, plugin_id: &str, source: Option<&str>, policy: ConventionPolicy) -> bool {
        self.plugin_id == plugin_id && self.source.as_deref() == source && self.policy == policy
    }
}

/// Remounts a host exactly when the mounted source identity changes.
pub struct PluginLifecycle {
    host: PluginHost,
    current: Option<SourceIdentity>,
}

impl PluginLifecycle {
    pub fn new(host: PluginHost) -> Self {
        Self { host, current: None }
    }

    /// Returns true when a remount happened.
    pub fn sync(&mut self, plugin_id: &str, source: Option<&str>) -> bool {
        let policy = self.host.policy();
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.matches(plugin_id, source, policy))
        {
            return false;
        }
        debug!(plugin_id, "plugin source changed, remounting");
        self.host.mount(source);
        self.current = Some(SourceIdentity {
            plugin_id: plugin_id.to_string(),
            source: source.map(str::to_string),
            policy,
        });
        true
    }

    /// Mounts the current source again from scratch.
    pub fn reload(&mut self) {
        if let Some(current) = &self.current {
            self.host.mount(current.source.as_deref());
        }
    }

    pub fn unmount(&mut self) {
        self.host.teardown();
        self.current = None;
    }

    pub fn mounted_plugin(&self) -> Option<&str> {
        self.current.as_ref().map(|identity| identity.plugin_id.as_str())
    }

    pub fn host(&self) -> &PluginHost {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut PluginHost {
        &mut self.host
    }
}

impl Default for PluginLifecycle {
    fn default() -> Self {
        Self::new(PluginHost::default())
    }
}
