//! Renderer and resolver configuration.

use crate::render::LOOP_LIMIT;

/// How a renderer exposes the attachment points of its views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Views own live elements that callers may access.
    #[default]
    Interactive,
    /// Server-side or otherwise inert rendering; element access is an error.
    Inert,
}

impl RenderMode {
    pub fn is_interactive(self) -> bool {
        matches!(self, RenderMode::Interactive)
    }
}

#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub mode: RenderMode,
    /// Consecutive invalid sweeps tolerated before the renderer is destroyed.
    pub loop_limit: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Interactive,
            loop_limit: LOOP_LIMIT,
        }
    }
}

impl RendererConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inert() -> Self {
        Self::default().mode(RenderMode::Inert)
    }

    pub fn mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn loop_limit(mut self, loop_limit: u32) -> Self {
        self.loop_limit = loop_limit;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolverConfig {
    /// Components without a backing class render through the template-only
    /// manager instead of the legacy default curly manager.
    pub template_only_components: bool,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template_only_components(mut self, enabled: bool) -> Self {
        self.template_only_components = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.mode, RenderMode::Interactive);
        assert_eq!(config.loop_limit, LOOP_LIMIT);
    }

    #[test]
    fn test_renderer_builder() {
        let config = RendererConfig::inert().loop_limit(3);
        assert!(!config.mode.is_interactive());
        assert_eq!(config.loop_limit, 3);
    }

    #[test]
    fn test_resolver_builder() {
        assert!(!ResolverConfig::default().template_only_components);
        assert!(
            ResolverConfig::new()
                .template_only_components(true)
                .template_only_components
        );
    }
}
