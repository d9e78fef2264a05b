//! Network settings shared by every transfer in the process.

use reqwest::{Client, Proxy};

use crate::USER_AGENT;

/// Knobs applied to every HTTP client the process builds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpSettings {
    /// Log connection-level traffic.
    pub verbose: bool,
    /// Accept invalid TLS certificates.
    pub ignore_ssl_checks: bool,
    /// Proxy URL for all schemes.
    pub proxy: Option<String>,
}

impl HttpSettings {
    /// Build a client honoring these settings.
    pub fn client(&self) -> reqwest::Result<Client> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .connection_verbose(self.verbose)
            .danger_accept_invalid_certs(self.ignore_ssl_checks);

        if let Some(proxy) = self.proxy.as_deref().filter(|p| !p.is_empty()) {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_proxy() {
        let settings = HttpSettings {
            verbose: true,
            ignore_ssl_checks: true,
            proxy: Some("http://127.0.0.1:3128".to_string()),
        };
        assert!(settings.client().is_ok());
    }

    #[test]
    fn test_empty_proxy_is_ignored() {
        let settings = HttpSettings {
            proxy: Some(String::new()),
            ..HttpSettings::default()
        };
        assert!(settings.client().is_ok());
    }
}
