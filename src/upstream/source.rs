//! Sources for the upstream proxy URL.

use crate::config::UpstreamConfig;

/// Supplies the upstream proxy URL each time a request needs it.
pub trait ProxyUrlSource: Send + Sync {
    fn proxy_url(&self) -> Option<String>;
}

/// Reads the first non-empty variable from the process environment.
#[derive(Debug, Clone)]
pub struct EnvProxySource {
    vars: Vec<String>,
}

impl EnvProxySource {
    pub fn new(vars: Vec<String>) -> Self {
        Self { vars }
    }
}

impl ProxyUrlSource for EnvProxySource {
    fn proxy_url(&self) -> Option<String> {
        self.vars
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.trim().is_empty())
    }
}

/// A proxy URL fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct FixedProxySource(Option<String>);

impl FixedProxySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self(Some(url.into()))
    }

    /// A source that never yields a URL, so the fallback endpoint is used.
    pub fn none() -> Self {
        Self(None)
    }
}

impl ProxyUrlSource for FixedProxySource {
    fn proxy_url(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Build the source described by the configuration.
pub fn from_config(config: &UpstreamConfig) -> Box<dyn ProxyUrlSource> {
    match &config.proxy_url {
        Some(url) => Box::new(FixedProxySource::new(url.clone())),
        None => Box::new(EnvProxySource::new(config.env_vars.clone())),
    }
}
