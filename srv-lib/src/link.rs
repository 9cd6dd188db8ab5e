use crate::config::LinkConfig;

/// Turns a token into the public URL shown to the sender.
#[derive(Clone, Debug)]
pub struct LinkBuilder {
    config: LinkConfig,
}

impl LinkBuilder {
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }

    /// `request_host` is used unless a host override is configured. The token
    /// always ends up verbatim as the last path segment.
    pub fn build(&self, request_host: &str, token: &str) -> String {
        let proto = if self.config.https { "https" } else { "http" };
        let host = self
            .config
            .host_override
            .as_deref()
            .unwrap_or(request_host)
            .trim_end_matches('/');

        let mut link = format!("{proto}://{host}/");
        for segment in self.config.url_prefix.split('/').filter(|s| !s.is_empty()) {
            link.push_str(segment);
            link.push('/');
        }
        link.push_str(token);
        link
    }
}
