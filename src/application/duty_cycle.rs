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

//! One wake cycle, from wake classification to the suspend call.

use crate::application::power::{
    REASON_ACQUISITION_FAILED, REASON_BUTTON_PEEK, REASON_DEFERRED_BUTTON, REASON_DELIVERED,
    REASON_DELIVERY_FAILED, REASON_DISPLAY_ONLY,
};
use crate::application::{ControllerState, PowerManager, SleepPlan, WakeCause, WakeReason};
use crate::config::{ConfigurationError, DeviceConfig};
use crate::connectivity::{ConnectivitySession, Identity, Transport, TransmissionOutcome};
use crate::hmi::{ButtonLatch, DisplayPanel, DisplayPresenter};
use crate::measurement::{build_measurement, Measurement};
use crate::sensors::{AcquisitionError, AcquisitionService, BatteryAdc, ClimateSensor, LoadCell};
use embassy_time::Timer;
use heapless::Vec;

/// First attempt plus one retry.
pub const MAX_PUBLISH_ATTEMPTS: u8 = 2;

const MAX_TRACE: usize = 8;
const NO_READING_MESSAGE: &str = "Scale unavailable";

pub type StateTrace = Vec<ControllerState, MAX_TRACE>;

/// What happened during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub wake_reason: WakeReason,
    pub states: StateTrace,
    pub acquisition_error: Option<AcquisitionError>,
    pub publish_attempts: u8,
    /// Outcome of the last publish attempt, `None` if nothing was published
    pub outcome: Option<TransmissionOutcome>,
    pub sleep_plan: SleepPlan,
}

pub struct DutyCycleController<'a, LC, CS, BA, D, T, P> {
    config: &'a DeviceConfig,
    sensors: AcquisitionService<LC, CS, BA>,
    display: Option<D>,
    transport: Option<T>,
    power: P,
    button: &'a ButtonLatch,
    trace: StateTrace,
}

impl<'a, LC, CS, BA, D, T, P> DutyCycleController<'a, LC, CS, BA, D, T, P>
where
    LC: LoadCell,
    CS: ClimateSensor,
    BA: BatteryAdc,
    D: DisplayPanel,
    T: Transport,
    P: PowerManager,
{
    /// Checks the configuration before anything runs. A node without a panel needs a
    /// transport and the other way round.
    pub fn new(
        config: &'a DeviceConfig,
        sensors: AcquisitionService<LC, CS, BA>,
        display: Option<D>,
        transport: Option<T>,
        power: P,
        button: &'a ButtonLatch,
    ) -> Result<Self, ConfigurationError> {
        let checked = config.validate().and_then(|_| {
            if transport.is_none() && (display.is_none() || !config.display_enabled) {
                Err(ConfigurationError::NoOutput)
            } else {
                Ok(())
            }
        });
        if let Err(e) = checked {
            error!("Refusing to start: {:?}", e);
            return Err(e);
        }

        Ok(Self {
            config,
            sensors,
            display,
            transport,
            power,
            button,
            trace: Vec::new(),
        })
    }

    /// Run a full cycle and suspend. Always ends in `Sleeping` with a plan handed to the power
    /// layer, whatever failed along the way.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.trace.clear();
        enter(&mut self.trace, ControllerState::WakingUp);

        let cause = self.power.wake_cause();
        // a press during power on is left latched and picked up by the next cycle
        let latched = cause != WakeCause::PowerOn && self.button.take();
        let wake_reason = WakeReason::classify(cause, latched);
        info!("Wake cause {:?}, running as {:?}", cause, wake_reason);

        let mut report = CycleReport {
            wake_reason,
            states: StateTrace::new(),
            acquisition_error: None,
            publish_attempts: 0,
            outcome: None,
            sleep_plan: SleepPlan {
                duration: self.config.sleep_interval,
                reason: REASON_DISPLAY_ONLY,
            },
        };

        enter(&mut self.trace, ControllerState::Acquiring);
        let measurement = match self.sensors.acquire(self.config.load_cell_samples).await {
            Ok(raw) => Some(build_measurement(
                &raw,
                &self.config.calibration,
                self.power.now(),
            )),
            Err(e) => {
                warn!("Acquisition failed: {:?}", e);
                report.acquisition_error = Some(e);
                None
            }
        };
        self.sensors.power_down().await;
        if let Some(m) = &measurement {
            info!("Weight {} kg", m.weight_kg);
        }

        match wake_reason {
            WakeReason::ButtonPressed => self.show(measurement.as_ref()).await,
            WakeReason::TimerExpired | WakeReason::PowerOn => {
                if wake_reason == WakeReason::PowerOn || self.transport.is_none() {
                    self.show(measurement.as_ref()).await;
                }
                if let Some(m) = &measurement {
                    self.transmit(m, wake_reason == WakeReason::PowerOn, &mut report)
                        .await;
                }
            }
        }

        report.sleep_plan = self.plan_sleep(&report);
        enter(&mut self.trace, ControllerState::Sleeping);
        info!(
            "Sleeping for {} s: {}",
            report.sleep_plan.duration.as_secs(),
            report.sleep_plan.reason
        );
        report.states = self.trace.clone();
        self.power.suspend(&report.sleep_plan).await;
        report
    }

    async fn show(&mut self, measurement: Option<&Measurement>) {
        let enabled = self.config.display_enabled;
        let Some(panel) = self.display.as_mut().filter(|_| enabled) else {
            debug!("No panel to show the reading on");
            return;
        };
        enter(&mut self.trace, ControllerState::Displaying);

        let dwell = self.config.screen_dwell;
        let shown = match measurement {
            Some(m) => DisplayPresenter::present(panel, m, dwell).await,
            None => DisplayPresenter::present_fault(panel, NO_READING_MESSAGE, dwell).await,
        };
        if let Err(e) = shown {
            warn!("Panel error while presenting: {:?}", e);
        }
    }

    async fn transmit(
        &mut self,
        measurement: &Measurement,
        announce: bool,
        report: &mut CycleReport,
    ) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        enter(&mut self.trace, ControllerState::Transmitting);

        let config = self.config;
        let identity = Identity {
            device_id: config.device_id.as_str(),
            device_name: config.device_name.as_str(),
        };

        for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
            report.publish_attempts = attempt;
            let mut session = ConnectivitySession::new(&mut *transport);
            let outcome = if announce {
                session
                    .announce_and_publish(
                        measurement,
                        &identity,
                        &config.endpoint,
                        &config.credentials,
                        config.publish_budget,
                        config.discovery_prefix.as_str(),
                    )
                    .await
            } else {
                session
                    .publish(
                        measurement,
                        &identity,
                        &config.endpoint,
                        &config.credentials,
                        config.publish_budget,
                    )
                    .await
            };
            report.outcome = Some(outcome);

            if outcome == TransmissionOutcome::Delivered {
                return;
            }
            warn!(
                "Publish attempt {} of {} ended {:?}",
                attempt, MAX_PUBLISH_ATTEMPTS, outcome
            );
            if attempt < MAX_PUBLISH_ATTEMPTS {
                Timer::after(config.retry_pause).await;
            }
        }
    }

    fn plan_sleep(&self, report: &CycleReport) -> SleepPlan {
        if self.button.is_pending() {
            return SleepPlan {
                duration: self.config.deferred_button_sleep,
                reason: REASON_DEFERRED_BUTTON,
            };
        }

        let (duration, reason) = match (report.wake_reason, report.outcome) {
            (WakeReason::ButtonPressed, _) => (self.config.button_sleep, REASON_BUTTON_PEEK),
            _ if report.acquisition_error.is_some() => {
                (self.config.sleep_interval, REASON_ACQUISITION_FAILED)
            }
            (_, Some(TransmissionOutcome::Delivered)) => {
                (self.config.sleep_interval, REASON_DELIVERED)
            }
            (_, Some(_)) => (self.config.sleep_interval, REASON_DELIVERY_FAILED),
            (_, None) => (self.config.sleep_interval, REASON_DISPLAY_ONLY),
        };
        SleepPlan { duration, reason }
    }

}

fn enter(trace: &mut StateTrace, state: ControllerState) {
    info!("Controller -> {:?}", state);
    let _ = trace.push(state);
}
