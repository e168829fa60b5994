//! Transport-level broker connection
//!
//! Treats a broker as reachable when a TCP connection to its host and port can
//! be established. No protocol handshake is performed.

use super::{BrokerConnection, ClientError};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use url::Url;

/// Default port for a broker URL scheme
fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "amqp" | "pyamqp" => Some(5672),
        "amqps" => Some(5671),
        "redis" => Some(6379),
        "rediss" => Some(6380),
        _ => None,
    }
}

/// A TCP connection to the broker named by a URL
#[derive(Debug)]
pub struct TcpBrokerConnection {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl TcpBrokerConnection {
    /// Parse `url` into a connectable host and port
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let invalid = |reason: &str| ClientError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = parsed
            .port()
            .or_else(|| default_port(parsed.scheme()))
            .ok_or_else(|| invalid("missing port and no default for scheme"))?;

        Ok(Self {
            host,
            port,
            stream: None,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[async_trait]
impl BrokerConnection for TcpBrokerConnection {
    async fn connect(&mut self) -> Result<(), ClientError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| ClientError::Connection {
                target: format!("{}:{}", self.host, self.port),
                reason: e.to_string(),
            })?;
        tracing::trace!(host = %self.host, port = self.port, "Broker TCP connection established");
        self.stream = Some(stream);
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), ClientError> {
        if let Some(mut stream) = self.stream {
            stream.shutdown().await?;
        }
        Ok(())
    }
}
