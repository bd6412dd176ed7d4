// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian repository HTTP client.

This module provides functionality for interfacing with HTTP based Debian
repositories.
*/

use {
    crate::{
        error::{BootstrapError, Result},
        repository::{DataResolver, RepositoryRootReader},
    },
    reqwest::{
        blocking::{Client, ClientBuilder},
        IntoUrl, Url,
    },
    std::io::Read,
};

/// Obtain an HTTP client, taking proxy environment variables into account.
pub fn get_http_client() -> Result<Client> {
    let mut builder = ClientBuilder::new().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));

    for (key, value) in std::env::vars() {
        let key = key.to_lowercase();

        if let Some(scheme) = key.strip_suffix("_proxy") {
            if let Ok(url) = Url::parse(&value) {
                let proxy = match scheme {
                    "http" => reqwest::Proxy::http(url.as_str()),
                    "https" => reqwest::Proxy::https(url.as_str()),
                    _ => continue,
                };

                if let Ok(proxy) = proxy {
                    builder = builder.proxy(proxy);
                }
            }
        }
    }

    Ok(builder.build()?)
}

fn fetch_url(client: &Client, root_url: &Url, path: &str) -> Result<Box<dyn Read>> {
    let url = root_url.join(path)?;

    let res = client
        .get(url.clone())
        .send()
        .map_err(|e| BootstrapError::Transport {
            url: url.to_string(),
            message: format!("error sending HTTP request: {}", e),
        })?;
    let res = res
        .error_for_status()
        .map_err(|e| BootstrapError::Transport {
            url: url.to_string(),
            message: format!("bad HTTP status code: {}", e),
        })?;

    Ok(Box::new(res))
}

/// Client for a Debian repository served via HTTP.
///
/// Instances are bound to a base URL, which represents the base directory.
/// `Packages` indices exist under its `dists/` directory.
#[derive(Debug)]
pub struct HttpRepositoryClient {
    /// HTTP client to use.
    client: Client,

    /// Base URL for this repository.
    root_url: Url,
}

impl HttpRepositoryClient {
    /// Construct an instance bound to the specified URL.
    pub fn new(url: impl IntoUrl) -> Result<Self> {
        Self::new_client(get_http_client()?, url)
    }

    /// Construct an instance using the given [Client] and URL.
    pub fn new_client(client: Client, url: impl IntoUrl) -> Result<Self> {
        let mut root_url = url.into_url()?;

        // Trailing URLs are significant to the Url type when we .join(). So ensure
        // the URL has a trailing path.
        if !root_url.path().ends_with('/') {
            root_url.set_path(&format!("{}/", root_url.path()));
        }

        Ok(Self { client, root_url })
    }
}

impl DataResolver for HttpRepositoryClient {
    fn url(&self) -> Result<Url> {
        Ok(self.root_url.clone())
    }

    fn get_path(&self, path: &str) -> Result<Box<dyn Read>> {
        fetch_url(&self.client, &self.root_url, path)
    }
}

impl RepositoryRootReader for HttpRepositoryClient {}
