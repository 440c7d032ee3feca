// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

//! Getting one measurement off the node: transport capability, endpoint description and the
//! bounded connect, publish, close session.

use crate::config::ConfigurationError;
use beescale_messages::MessageError;
use embassy_time::Duration;
use heapless::String;

pub mod session;

pub use session::{ConnectivitySession, Identity};

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// Reports go to `<topic_root>/<device_id>` on the broker
    Mqtt {
        host: String<64>,
        port: u16,
        topic_root: String<32>,
    },
    /// Reports are POSTed as JSON to `path`
    Http {
        host: String<64>,
        port: u16,
        path: String<64>,
    },
}

impl Endpoint {
    pub fn mqtt(host: &str, port: u16, topic_root: &str) -> Result<Self, ConfigurationError> {
        Ok(Endpoint::Mqtt {
            host: String::try_from(host).map_err(|_| ConfigurationError::InvalidEndpoint)?,
            port,
            topic_root: String::try_from(topic_root)
                .map_err(|_| ConfigurationError::InvalidEndpoint)?,
        })
    }

    pub fn http(host: &str, port: u16, path: &str) -> Result<Self, ConfigurationError> {
        Ok(Endpoint::Http {
            host: String::try_from(host).map_err(|_| ConfigurationError::InvalidEndpoint)?,
            port,
            path: String::try_from(path).map_err(|_| ConfigurationError::InvalidEndpoint)?,
        })
    }

    pub fn host(&self) -> &str {
        match self {
            Endpoint::Mqtt { host, .. } | Endpoint::Http { host, .. } => host.as_str(),
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Endpoint::Mqtt { port, .. } | Endpoint::Http { port, .. } => *port,
        }
    }

    pub fn is_mqtt(&self) -> bool {
        matches!(self, Endpoint::Mqtt { .. })
    }
}

/// Secrets for joining the network and authenticating at the endpoint. Empty means unused.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Credentials {
    pub network_ssid: String<64>,
    pub network_password: String<64>,
    pub username: String<64>,
    pub password: String<64>,
}

/// One message for the endpoint: an MQTT publish or an HTTP request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Publication<'a> {
    /// Topic for MQTT, request path for HTTP
    pub target: &'a str,
    pub body: &'a [u8],
    pub content_type: &'static str,
    pub retain: bool,
}

/// Network stack able to reach an [`Endpoint`]. Joining the network is part of `connect`.
pub trait Transport {
    type Handle;
    type Error;

    async fn connect(
        &mut self,
        endpoint: &Endpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self::Handle, Self::Error>;

    /// Returns once the endpoint acknowledged the publication.
    async fn send(
        &mut self,
        handle: &mut Self::Handle,
        publication: &Publication<'_>,
    ) -> Result<(), Self::Error>;

    /// Disconnect and release the radio.
    async fn close(&mut self, handle: Self::Handle) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Publishing,
    Closed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmissionOutcome {
    Delivered,
    ConnectFailed,
    PublishFailed,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectivityError {
    ConnectFailed,
    PublishFailed,
    Timeout,
    Payload(MessageError),
}

impl core::fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConnectivityError::ConnectFailed => write!(f, "could not connect to endpoint"),
            ConnectivityError::PublishFailed => write!(f, "endpoint did not accept the report"),
            ConnectivityError::Timeout => write!(f, "publish budget exhausted"),
            ConnectivityError::Payload(e) => write!(f, "payload could not be built: {}", e),
        }
    }
}

impl From<MessageError> for ConnectivityError {
    fn from(e: MessageError) -> Self {
        ConnectivityError::Payload(e)
    }
}

impl From<ConnectivityError> for TransmissionOutcome {
    fn from(e: ConnectivityError) -> Self {
        match e {
            ConnectivityError::ConnectFailed => TransmissionOutcome::ConnectFailed,
            ConnectivityError::Timeout => TransmissionOutcome::Timeout,
            ConnectivityError::PublishFailed | ConnectivityError::Payload(_) => {
                TransmissionOutcome::PublishFailed
            }
        }
    }
}
