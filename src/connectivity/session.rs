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

use crate::connectivity::{
    ConnectivityError, Credentials, Endpoint, Publication, SessionState, Transport,
    TransmissionOutcome, JSON_CONTENT_TYPE,
};
use crate::measurement::Measurement;
use beescale_messages::discovery::{
    discovery_topic, encode_discovery, ReportField, MAX_DISCOVERY_LEN,
};
use beescale_messages::{encode_report, state_topic, Topic, MAX_REPORT_LEN};
use embassy_time::{with_deadline, with_timeout, Duration, Instant};
use heapless::Vec;

/// Time allowed for a clean disconnect, on top of the publish budget.
pub const CLOSE_GRACE: Duration = Duration::from_secs(2);

const MAX_HISTORY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity<'a> {
    pub device_id: &'a str,
    /// Shown in Home Assistant
    pub device_name: &'a str,
}

/// One connect, publish, close sequence against a single deadline.
///
/// Never retries. Whoever owns the session decides whether another attempt is worth it.
pub struct ConnectivitySession<'t, T> {
    transport: &'t mut T,
    state: SessionState,
    history: Vec<SessionState, MAX_HISTORY>,
}

impl<'t, T: Transport> ConnectivitySession<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        let mut history = Vec::new();
        let _ = history.push(SessionState::Idle);
        Self {
            transport,
            state: SessionState::Idle,
            history,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state the last run passed through, starting at `Idle`.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub async fn publish(
        &mut self,
        measurement: &Measurement,
        identity: &Identity<'_>,
        endpoint: &Endpoint,
        credentials: &Credentials,
        budget: Duration,
    ) -> TransmissionOutcome {
        self.run(measurement, identity, endpoint, credentials, budget, None)
            .await
    }

    /// As [`Self::publish`], but first send the retained discovery documents for every report
    /// field. Only MQTT endpoints get them. A rejected document is logged and skipped.
    pub async fn announce_and_publish(
        &mut self,
        measurement: &Measurement,
        identity: &Identity<'_>,
        endpoint: &Endpoint,
        credentials: &Credentials,
        budget: Duration,
        discovery_prefix: &str,
    ) -> TransmissionOutcome {
        self.run(
            measurement,
            identity,
            endpoint,
            credentials,
            budget,
            Some(discovery_prefix),
        )
        .await
    }

    async fn run(
        &mut self,
        measurement: &Measurement,
        identity: &Identity<'_>,
        endpoint: &Endpoint,
        credentials: &Credentials,
        budget: Duration,
        discovery_prefix: Option<&str>,
    ) -> TransmissionOutcome {
        self.history.clear();
        self.enter(SessionState::Idle);
        let deadline = Instant::now() + budget;

        self.enter(SessionState::Connecting);
        let remaining = deadline.saturating_duration_since(Instant::now());
        let connected = with_deadline(
            deadline,
            self.transport.connect(endpoint, credentials, remaining),
        )
        .await;
        let mut handle = match connected {
            Ok(Ok(handle)) => handle,
            Ok(Err(_)) => return self.fail(ConnectivityError::ConnectFailed),
            Err(_) => return self.fail(ConnectivityError::Timeout),
        };
        self.enter(SessionState::Connected);

        self.enter(SessionState::Publishing);
        let delivered = with_deadline(
            deadline,
            deliver(
                &mut *self.transport,
                &mut handle,
                measurement,
                identity,
                endpoint,
                discovery_prefix,
            ),
        )
        .await
        .unwrap_or(Err(ConnectivityError::Timeout));

        match with_timeout(CLOSE_GRACE, self.transport.close(handle)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => warn!("Transport close reported an error"),
            Err(_) => warn!("Transport close timed out"),
        }

        match delivered {
            Ok(()) => {
                self.enter(SessionState::Closed);
                TransmissionOutcome::Delivered
            }
            Err(ConnectivityError::Timeout) => self.fail(ConnectivityError::Timeout),
            Err(e) => {
                warn!("Publish failed: {:?}", e);
                self.enter(SessionState::Closed);
                e.into()
            }
        }
    }

    fn enter(&mut self, state: SessionState) {
        debug!("Session {:?} -> {:?}", self.state, state);
        self.state = state;
        let _ = self.history.push(state);
    }

    fn fail(&mut self, error: ConnectivityError) -> TransmissionOutcome {
        warn!("Session failed in {:?}: {:?}", self.state, error);
        self.enter(SessionState::Failed);
        error.into()
    }
}

async fn deliver<T: Transport>(
    transport: &mut T,
    handle: &mut T::Handle,
    measurement: &Measurement,
    identity: &Identity<'_>,
    endpoint: &Endpoint,
    discovery_prefix: Option<&str>,
) -> Result<(), ConnectivityError> {
    let target: Topic = match endpoint {
        Endpoint::Mqtt { topic_root, .. } => state_topic(topic_root, identity.device_id)?,
        Endpoint::Http { path, .. } => {
            Topic::try_from(path.as_str()).map_err(|_| ConnectivityError::PublishFailed)?
        }
    };

    if let (Some(prefix), true) = (discovery_prefix, endpoint.is_mqtt()) {
        announce(transport, handle, identity, prefix, &target).await;
    }

    let mut body = [0u8; MAX_REPORT_LEN];
    let len = encode_report(&measurement.to_report(identity.device_id), &mut body)?;

    transport
        .send(
            handle,
            &Publication {
                target: &target,
                body: &body[..len],
                content_type: JSON_CONTENT_TYPE,
                retain: false,
            },
        )
        .await
        .map_err(|_| ConnectivityError::PublishFailed)?;
    info!("Report delivered to {}", target.as_str());
    Ok(())
}

async fn announce<T: Transport>(
    transport: &mut T,
    handle: &mut T::Handle,
    identity: &Identity<'_>,
    prefix: &str,
    state_topic: &str,
) {
    let mut document = [0u8; MAX_DISCOVERY_LEN];
    for field in ReportField::ALL {
        let prepared = discovery_topic(prefix, identity.device_id, field).and_then(|topic| {
            encode_discovery(
                field,
                identity.device_id,
                identity.device_name,
                state_topic,
                &mut document,
            )
            .map(|len| (topic, len))
        });
        let (topic, len) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("Discovery for {:?} not built: {:?}", field, e);
                continue;
            }
        };

        let sent = transport
            .send(
                handle,
                &Publication {
                    target: &topic,
                    body: &document[..len],
                    content_type: JSON_CONTENT_TYPE,
                    retain: true,
                },
            )
            .await;
        if sent.is_err() {
            warn!("Discovery for {:?} rejected", field);
        }
    }
}
