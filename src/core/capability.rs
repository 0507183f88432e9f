//! Capability registry (component D).
//!
//! Each peer tracks two records: *local* (what we advertise, accumulated by
//! capability modules during construction) and *remote* (what the
//! counterpart advertised, populated once `initialize` completes). Invoking a
//! method whose category is absent from the remote record fails locally with
//! [`McpError::Capability`] before anything is written to the transport.

use crate::core::error::{McpError, McpResult};
use crate::protocol::methods as m;
use crate::protocol::types::{ClientCapabilities, ResourcesCapability, ServerCapabilities};

/// The feature area a method belongs to, for capability gating. Methods not
/// covered by any capability (`initialize`, `ping`) are always permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityCategory {
    Tools,
    Resources,
    ResourcesSubscribe,
    Prompts,
    Roots,
    Sampling,
    Elicitation,
    Logging,
    Completions,
}

impl CapabilityCategory {
    /// Classifies an outbound method call. Returns `None` for methods that
    /// are never capability-gated.
    pub fn of_method(method: &str) -> Option<CapabilityCategory> {
        Some(match method {
            m::TOOLS_LIST | m::TOOLS_CALL => CapabilityCategory::Tools,
            m::RESOURCES_LIST | m::RESOURCES_TEMPLATES_LIST | m::RESOURCES_READ => {
                CapabilityCategory::Resources
            }
            m::RESOURCES_SUBSCRIBE | m::RESOURCES_UNSUBSCRIBE => {
                CapabilityCategory::ResourcesSubscribe
            }
            m::PROMPTS_LIST | m::PROMPTS_GET => CapabilityCategory::Prompts,
            m::ROOTS_LIST => CapabilityCategory::Roots,
            m::SAMPLING_CREATE_MESSAGE => CapabilityCategory::Sampling,
            m::ELICITATION_CREATE => CapabilityCategory::Elicitation,
            m::LOGGING_SET_LEVEL => CapabilityCategory::Logging,
            m::COMPLETION_COMPLETE => CapabilityCategory::Completions,
            _ => return None,
        })
    }
}

/// Capabilities accumulated locally by installed capability modules, in
/// whichever record this peer will eventually advertise.
#[derive(Debug, Clone, Default)]
pub struct LocalCapabilities {
    pub client: ClientCapabilities,
    pub server: ServerCapabilities,
}

/// Capabilities the remote side advertised, learned from the `initialize`
/// exchange. `None` until negotiation completes.
#[derive(Debug, Clone, Default)]
pub struct RemoteCapabilities {
    pub client: Option<ClientCapabilities>,
    pub server: Option<ServerCapabilities>,
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    pub local: LocalCapabilities,
    pub remote: RemoteCapabilities,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_tools(&mut self, list_changed: bool) {
        self.local.server.tools = Some(crate::protocol::types::ToolsCapability {
            list_changed: Some(list_changed),
        });
    }

    pub fn enable_resources(&mut self, list_changed: bool, subscribe: bool) {
        self.local.server.resources = Some(ResourcesCapability {
            list_changed: Some(list_changed),
            subscribe: Some(subscribe),
        });
    }

    pub fn enable_prompts(&mut self, list_changed: bool) {
        self.local.server.prompts = Some(crate::protocol::types::PromptsCapability {
            list_changed: Some(list_changed),
        });
    }

    pub fn enable_completions(&mut self) {
        self.local.server.completions = Some(crate::protocol::types::CompletionsCapability {});
    }

    pub fn enable_logging(&mut self) {
        self.local.server.logging = Some(crate::protocol::types::LoggingCapability {});
    }

    pub fn enable_roots(&mut self, list_changed: bool) {
        self.local.client.roots = Some(crate::protocol::types::RootsCapability {
            list_changed: Some(list_changed),
        });
    }

    pub fn set_remote_server(&mut self, caps: ServerCapabilities) {
        self.remote.server = Some(caps);
    }

    pub fn set_remote_client(&mut self, caps: ClientCapabilities) {
        self.remote.client = Some(caps);
    }

    /// Checks whether the remote side has advertised the category this
    /// method belongs to. Methods with no category are always allowed.
    pub fn check_outbound(&self, method: &str) -> McpResult<()> {
        let Some(category) = CapabilityCategory::of_method(method) else {
            return Ok(());
        };

        let allowed = match category {
            CapabilityCategory::Tools => self
                .remote
                .server
                .as_ref()
                .is_some_and(|s| s.tools.is_some()),
            CapabilityCategory::Resources => self
                .remote
                .server
                .as_ref()
                .is_some_and(|s| s.resources.is_some()),
            CapabilityCategory::ResourcesSubscribe => self
                .remote
                .server
                .as_ref()
                .and_then(|s| s.resources.as_ref())
                .is_some_and(|r| r.subscribe == Some(true)),
            CapabilityCategory::Prompts => self
                .remote
                .server
                .as_ref()
                .is_some_and(|s| s.prompts.is_some()),
            CapabilityCategory::Logging => self
                .remote
                .server
                .as_ref()
                .is_some_and(|s| s.logging.is_some()),
            CapabilityCategory::Completions => self
                .remote
                .server
                .as_ref()
                .is_some_and(|s| s.completions.is_some()),
            CapabilityCategory::Roots => self
                .remote
                .client
                .as_ref()
                .is_some_and(|c| c.roots.is_some()),
            CapabilityCategory::Sampling => self
                .remote
                .client
                .as_ref()
                .is_some_and(|c| c.sampling.is_some()),
            CapabilityCategory::Elicitation => self
                .remote
                .client
                .as_ref()
                .is_some_and(|c| c.elicitation.is_some()),
        };

        if allowed {
            Ok(())
        } else {
            Err(McpError::Capability(format!(
                "Capability not supported: {method}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_rejected_before_remote_advertises_tools() {
        let registry = CapabilityRegistry::new();
        let err = registry.check_outbound(m::TOOLS_CALL).unwrap_err();
        assert_eq!(err.category(), "capability");
    }

    #[test]
    fn tool_call_allowed_once_remote_advertises_tools() {
        let mut registry = CapabilityRegistry::new();
        registry.set_remote_server(ServerCapabilities {
            tools: Some(crate::protocol::types::ToolsCapability {
                list_changed: Some(true),
            }),
            ..Default::default()
        });
        assert!(registry.check_outbound(m::TOOLS_CALL).is_ok());
    }

    #[test]
    fn resources_subscribe_requires_the_subscribe_flag_specifically() {
        let mut registry = CapabilityRegistry::new();
        registry.set_remote_server(ServerCapabilities {
            resources: Some(ResourcesCapability {
                list_changed: Some(true),
                subscribe: Some(false),
            }),
            ..Default::default()
        });
        assert!(registry.check_outbound(m::RESOURCES_LIST).is_ok());
        assert!(registry.check_outbound(m::RESOURCES_SUBSCRIBE).is_err());
    }

    #[test]
    fn ping_is_never_capability_gated() {
        let registry = CapabilityRegistry::new();
        assert!(registry.check_outbound(m::PING).is_ok());
    }
}
