//! HTTP transport for the RPC API and the geocoder.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{HarvesterError, Result};

/// User agent string identifying this harvester.
const USER_AGENT: &str = concat!("cashpoints-harvester/", env!("CARGO_PKG_VERSION"));

/// Raw request/response seam. Everything above it deals in strings so tests
/// can script responses without a server.
pub trait Transport {
    /// POST `body` with extra `headers`, returning the response body.
    fn post(&self, url: &str, headers: &[(&str, &str)], body: &str) -> Result<String>;

    /// GET `url`, returning the response body.
    fn get(&self, url: &str) -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, url: &str, headers: &[(&str, &str)], body: &str) -> Result<String> {
        (**self).post(url, headers, body)
    }

    fn get(&self, url: &str) -> Result<String> {
        (**self).get(url)
    }
}

/// Create a configured HTTP client.
///
/// # Returns
/// A `reqwest::blocking::Client` with the given timeout and our user agent.
pub fn create_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Blocking `reqwest` transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client(timeout)?,
        })
    }
}

/// Connect and timeout failures become `Connection`; the rest stay `Http`.
fn classify(url: &str, e: reqwest::Error) -> HarvesterError {
    if e.is_connect() || e.is_timeout() {
        tracing::warn!(url, error = %e, "connection failed");
        HarvesterError::Connection {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else {
        HarvesterError::Http(e)
    }
}

fn read_body(url: &str, response: reqwest::blocking::Response) -> Result<String> {
    let response = response.error_for_status()?;
    response.text().map_err(|e| classify(url, e))
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, headers: &[(&str, &str)], body: &str) -> Result<String> {
        let mut request = self.client.post(url).body(body.to_string());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().map_err(|e| classify(url, e))?;
        read_body(url, response)
    }

    fn get(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().map_err(|e| classify(url, e))?;
        read_body(url, response)
    }
}
