//! Glue between received frames, timers and the protocol engines

use rand::Rng;

use crate::{
    bmc::{foreign_master::ForeignMasterList, ForeignClockDS},
    config::{InstanceConfig, PortConfig},
    datastructures::{
        common::PortIdentity,
        datasets::{CurrentDS, DefaultDS, ParentDS},
        messages::{AnnounceMessage, Message, MessageBody},
        WireFormatError,
    },
    hardware::HardwareClock,
    observability::{GptpPortSnapshot, ReceiveOutcome},
    pdelay::PathDelayEngine,
    port::{InvalidTransition, Port, PortActionIterator, PortEvent},
    sync::{SyncConfig, TimeSyncEngine},
    time::{Duration, Time},
    validation::MessageValidator,
};

/// What came out of handing one received frame to the port.
///
/// `transmit`, when set, is a frame the host must send on the same link (a
/// peer delay response). `actions` carries port actions triggered by the
/// frame, such as a BMCA decision demoting the local master.
#[derive(Debug)]
pub struct ReceiveResult<'a> {
    pub outcome: ReceiveOutcome,
    pub actions: PortActionIterator,
    pub transmit: Option<&'a [u8]>,
}

/// A single gPTP port wired up as one unit: validator, state machine, BMCA
/// bookkeeping, time synchronization and path delay measurement.
///
/// The host owns the network and all timers. It feeds received frames into
/// [`handle_event_receive`](`Self::handle_event_receive`) (messages
/// timestamped in hardware) and
/// [`handle_general_receive`](`Self::handle_general_receive`), delivers
/// timer expiries to the `handle_*_timeout` methods, and transmits whatever
/// frames the port hands back.
///
/// Two hardware clock handles are taken so the synchronization servo and the
/// path delay engine can capture timestamps independently; on most platforms
/// these are two handles to the same physical clock.
#[derive(Debug)]
pub struct GptpPort<H, R> {
    validator: MessageValidator,
    port: Port<R>,
    default_ds: DefaultDS,
    parent_ds: ParentDS,
    current_ds: CurrentDS,
    foreign_masters: ForeignMasterList,
    sync: TimeSyncEngine<H>,
    pdelay: PathDelayEngine<H>,
    announce_sequence_id: u16,
    sync_sequence_id: u16,
    invalid_messages: u64,
}

impl<H: HardwareClock, R: Rng> GptpPort<H, R> {
    pub fn new(
        instance_config: InstanceConfig,
        port_config: PortConfig,
        sync_config: SyncConfig,
        port_number: u16,
        sync_clock: H,
        pdelay_clock: H,
        rng: R,
    ) -> Self {
        let default_ds = DefaultDS::new(instance_config);
        let port_identity = PortIdentity {
            clock_identity: default_ds.clock_identity,
            port_number,
        };

        Self {
            validator: MessageValidator::new(&[instance_config.domain_number]),
            port: Port::new(port_config, port_identity, rng),
            default_ds,
            parent_ds: ParentDS::new(&default_ds),
            current_ds: CurrentDS::default(),
            foreign_masters: ForeignMasterList::new(
                port_config.announce_interval.as_duration(),
                port_identity,
            ),
            sync: TimeSyncEngine::new(sync_clock, sync_config),
            pdelay: PathDelayEngine::new(
                pdelay_clock,
                port_identity,
                port_config.pdelay_allowed_lost,
            ),
            announce_sequence_id: 0,
            sync_sequence_id: 0,
            invalid_messages: 0,
        }
    }

    /// Enable or disable the port administratively
    pub fn handle_port_event(
        &mut self,
        event: PortEvent,
    ) -> Result<PortActionIterator, InvalidTransition> {
        self.port.handle_event(event)
    }

    /// A frame arrived on the event (hardware timestamped) address, `rx`
    /// being its arrival timestamp.
    pub fn handle_event_receive<'a>(
        &mut self,
        data: &[u8],
        rx: Time,
        response_buffer: &'a mut [u8],
    ) -> ReceiveResult<'a> {
        let report = self.validator.validate(data);
        if !report.is_valid() {
            self.invalid_messages += 1;
            return ReceiveResult {
                outcome: ReceiveOutcome {
                    report,
                    accepted: false,
                },
                actions: PortActionIterator::empty(),
                transmit: None,
            };
        }

        let message = match Message::deserialize(data) {
            Ok(message) => message,
            Err(error) => return self.drop_undecodable(report, error),
        };

        let mean_path_delay = self.master_to_slave_delay();
        let mut transmit = None;

        match &message.body {
            MessageBody::Sync(sync) => {
                self.sync.handle_sync(
                    message.header.two_step_flag,
                    message.header.sequence_id,
                    sync.origin_timestamp.into(),
                    rx,
                    mean_path_delay,
                );
                self.update_offset_from_master();
            }
            MessageBody::PDelayReq(_) => {
                let response = self.pdelay.handle_request(&message.header, rx);
                match response.serialize(response_buffer) {
                    Ok(length) => transmit = Some(&response_buffer[..length]),
                    Err(error) => log::error!("cannot serialize pdelay response: {}", error),
                }
            }
            MessageBody::PDelayResp(response) => {
                self.pdelay.handle_response(response, &message.header, rx);
            }
            _ => {
                log::debug!("non-event message on the event path, ignoring");
            }
        }

        ReceiveResult {
            outcome: ReceiveOutcome {
                report,
                accepted: true,
            },
            actions: PortActionIterator::empty(),
            transmit,
        }
    }

    /// A frame arrived on the general (untimestamped) address
    pub fn handle_general_receive(&mut self, data: &[u8]) -> ReceiveResult<'static> {
        let report = self.validator.validate(data);
        if !report.is_valid() {
            self.invalid_messages += 1;
            return ReceiveResult {
                outcome: ReceiveOutcome {
                    report,
                    accepted: false,
                },
                actions: PortActionIterator::empty(),
                transmit: None,
            };
        }

        let message = match Message::deserialize(data) {
            Ok(message) => message,
            Err(error) => return self.drop_undecodable(report, error),
        };

        let mean_path_delay = self.master_to_slave_delay();
        let mut actions = PortActionIterator::empty();

        match &message.body {
            MessageBody::FollowUp(follow_up) => {
                self.sync.handle_follow_up(
                    message.header.sequence_id,
                    follow_up.precise_origin_timestamp.into(),
                    mean_path_delay,
                );
                self.update_offset_from_master();
            }
            MessageBody::PDelayRespFollowUp(follow_up) => {
                self.pdelay
                    .handle_response_follow_up(follow_up, &message.header);
            }
            MessageBody::Announce(announce) => {
                actions = self.handle_announce(announce);
            }
            MessageBody::Signaling(_) | MessageBody::Management(_) => {
                log::trace!("signaling/management not handled by the core");
            }
            _ => {
                log::debug!("event message on the general path, ignoring");
            }
        }

        ReceiveResult {
            outcome: ReceiveOutcome {
                report,
                accepted: true,
            },
            actions,
            transmit: None,
        }
    }

    /// The delay in the master to slave direction: the measured mean link
    /// delay corrected by the configured link asymmetry
    fn master_to_slave_delay(&self) -> Duration {
        self.pdelay.mean_path_delay().unwrap_or(Duration::ZERO)
            + self.port.config().delay_asymmetry
    }

    fn update_offset_from_master(&mut self) {
        if let Some(offset) = self.sync.statistics().current_offset {
            self.current_ds.offset_from_master = offset;
        }
    }

    fn drop_undecodable(
        &mut self,
        report: crate::validation::ValidationReport,
        error: WireFormatError,
    ) -> ReceiveResult<'static> {
        log::debug!("validated frame failed to decode: {}", error);
        self.invalid_messages += 1;
        ReceiveResult {
            outcome: ReceiveOutcome {
                report,
                accepted: false,
            },
            actions: PortActionIterator::empty(),
            transmit: None,
        }
    }

    /// Register an Announce and run the best master clock algorithm over the
    /// qualified foreign masters
    fn handle_announce(&mut self, announce: &AnnounceMessage) -> PortActionIterator {
        self.foreign_masters
            .register_announce_message(announce, Duration::ZERO);

        let local = ForeignClockDS::from_default_ds(&self.default_ds);
        let mut best: Option<AnnounceMessage> = None;

        for candidate in self.foreign_masters.take_qualified_announce_messages() {
            let clock = ForeignClockDS::from_announce(&candidate.message);

            let beats_local = clock.is_better_than(&local) || self.default_ds.slave_only;
            let beats_best = match &best {
                None => true,
                Some(current) => clock.is_better_than(&ForeignClockDS::from_announce(current)),
            };
            if beats_local && beats_best {
                best = Some(candidate.message);
            }
        }

        let Some(winner) = best else {
            return PortActionIterator::empty();
        };

        self.parent_ds.parent_port_identity = winner.header.source_port_identity;
        self.parent_ds.grandmaster_identity = winner.grandmaster_identity;
        self.parent_ds.grandmaster_clock_quality = winner.grandmaster_clock_quality;
        self.parent_ds.grandmaster_priority_1 = winner.grandmaster_priority_1;
        self.parent_ds.grandmaster_priority_2 = winner.grandmaster_priority_2;
        self.parent_ds.time_source = winner.time_source;
        self.current_ds.steps_removed = winner.steps_removed + 1;

        match self.port.handle_event(PortEvent::SuperiorAnnounce) {
            Ok(actions) => actions,
            Err(_) => PortActionIterator::empty(),
        }
    }

    /// Age the stored foreign master announces by the time passed since the
    /// last call
    pub fn advance_announce_age(&mut self, step: Duration) {
        self.foreign_masters.step_age(step);
    }

    /// The announce receipt timeout expired: the master went quiet
    pub fn handle_announce_receipt_timeout(
        &mut self,
    ) -> Result<PortActionIterator, InvalidTransition> {
        self.sync.handle_sync_timeout();
        self.port.handle_event(PortEvent::AnnounceReceiptTimeout)
    }

    /// The sync receipt timeout expired without a Sync from the master
    pub fn handle_sync_timeout(&mut self) {
        self.sync.handle_sync_timeout();
    }

    /// The peer delay response timeout expired
    pub fn handle_pdelay_timeout(&mut self) {
        self.pdelay.handle_timeout();
    }

    /// The offset fell below threshold and the slave is usable
    pub fn handle_calibration_complete(
        &mut self,
    ) -> Result<PortActionIterator, InvalidTransition> {
        self.port.handle_event(PortEvent::CalibrationComplete)
    }

    /// Serialize the next Announce of the cyclic master transmission
    pub fn announce_message(&mut self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        self.announce_sequence_id = self.announce_sequence_id.wrapping_add(1);
        Message::announce(
            &self.default_ds,
            &self.parent_ds,
            &self.current_ds,
            self.port.port_identity(),
            self.announce_sequence_id,
            self.port.config().announce_interval.as_log_2(),
        )
        .serialize(buffer)
    }

    /// Serialize the next Sync of the cyclic master transmission, returning
    /// its sequence id alongside the frame size
    pub fn sync_message(&mut self, buffer: &mut [u8]) -> Result<(u16, usize), WireFormatError> {
        self.sync_sequence_id = self.sync_sequence_id.wrapping_add(1);
        let length = Message::sync(
            &self.default_ds,
            self.port.port_identity(),
            self.sync_sequence_id,
            self.port.config().sync_interval.as_log_2(),
        )
        .serialize(buffer)?;
        Ok((self.sync_sequence_id, length))
    }

    /// Serialize the Follow_Up for an already transmitted Sync, capturing
    /// its departure timestamp from the hardware
    pub fn follow_up_message(
        &mut self,
        sequence_id: u16,
        buffer: &mut [u8],
    ) -> Result<usize, WireFormatError> {
        let timestamp = match self.sync.clock_mut().capture_tx_timestamp(sequence_id) {
            Ok(timestamp) => timestamp,
            Err(error) => {
                log::error!("sync tx timestamp unavailable: {:?}", error);
                return Err(WireFormatError::Invalid);
            }
        };

        Message::follow_up(
            &self.default_ds,
            self.port.port_identity(),
            sequence_id,
            self.port.config().sync_interval.as_log_2(),
            timestamp,
        )
        .serialize(buffer)
    }

    /// Begin a peer delay measurement cycle, serializing the request
    pub fn start_pdelay_cycle(&mut self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        let default_ds = self.default_ds;
        self.pdelay.start_cycle(&default_ds).serialize(buffer)
    }

    /// Our peer delay response left the wire; serialize its follow up
    pub fn pdelay_response_sent(
        &mut self,
        sequence_id: u16,
        buffer: &mut [u8],
    ) -> Result<Option<usize>, WireFormatError> {
        match self.pdelay.handle_response_sent(sequence_id) {
            Some(message) => message.serialize(buffer).map(Some),
            None => Ok(None),
        }
    }

    /// A read-only snapshot of everything the port can report about itself
    pub fn observe(&self) -> GptpPortSnapshot {
        GptpPortSnapshot {
            port_state: self.port.state(),
            sync_state: self.sync.state(),
            current_offset: self.sync.statistics().current_offset,
            mean_path_delay: self.pdelay.mean_path_delay(),
            path_delay_valid: self.pdelay.is_measurement_valid(),
            port_statistics: self.port.statistics(),
            sync_statistics: self.sync.statistics(),
            path_delay_statistics: self.pdelay.statistics(),
            invalid_messages: self.invalid_messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ClockIdentity,
        datastructures::messages::MAX_DATA_LEN,
        hardware::SimulatedHardwareClock,
        port::{PortAction, PortState},
        validation::Violation,
    };

    type TestPort = GptpPort<SimulatedHardwareClock, rand::rngs::mock::StepRng>;

    fn test_port() -> TestPort {
        let instance_config = InstanceConfig::new(ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]));
        GptpPort::new(
            instance_config,
            PortConfig::default(),
            SyncConfig::default(),
            1,
            SimulatedHardwareClock::default(),
            SimulatedHardwareClock::default(),
            rand::rngs::mock::StepRng::new(2, 1),
        )
    }

    fn superior_announce(sequence_id: u16) -> std::vec::Vec<u8> {
        // a remote instance with a better priority than the local 248
        let remote_config = InstanceConfig {
            priority_1: 10,
            ..InstanceConfig::new(ClockIdentity([9, 9, 9, 9, 9, 9, 9, 9]))
        };
        let remote_default_ds = DefaultDS::new(remote_config);
        let remote_parent_ds = ParentDS::new(&remote_default_ds);
        let remote_identity = PortIdentity {
            clock_identity: remote_config.clock_identity,
            port_number: 1,
        };

        let mut buffer = std::vec![0; MAX_DATA_LEN];
        let length = Message::announce(
            &remote_default_ds,
            &remote_parent_ds,
            &CurrentDS::default(),
            remote_identity,
            sequence_id,
            0,
        )
        .serialize(&mut buffer)
        .unwrap();
        buffer.truncate(length);
        buffer
    }

    #[test]
    fn invalid_frames_are_dropped_and_counted() {
        let mut port = test_port();
        let mut response_buffer = [0; MAX_DATA_LEN];

        let result = port.handle_event_receive(&[0; 10], Time::ZERO, &mut response_buffer);
        assert!(!result.outcome.accepted);
        assert_eq!(
            result.outcome.report.violations(),
            &[Violation::BufferTooShort]
        );
        assert_eq!(port.observe().invalid_messages, 1);
    }

    #[test]
    fn superior_announce_drives_bmca() {
        let mut port = test_port();
        port.handle_port_event(PortEvent::EnablePort).unwrap();
        assert_eq!(port.observe().port_state, PortState::Listening);

        // qualification needs two announces inside the window
        let first = port.handle_general_receive(&superior_announce(1));
        assert!(first.outcome.accepted);
        let second = port.handle_general_receive(&superior_announce(2));

        assert_eq!(port.observe().port_state, PortState::Uncalibrated);
        let actions: std::vec::Vec<_> = second.actions.collect();
        assert!(matches!(
            actions[..],
            [PortAction::ResetAnnounceReceiptTimer { .. }]
        ));

        // the parent dataset now tracks the remote grandmaster
        port.handle_calibration_complete().unwrap();
        assert_eq!(port.observe().port_state, PortState::Slave);
    }

    #[test]
    fn pdelay_request_is_answered_on_the_spot() {
        let mut port = test_port();
        let mut remote = test_port_with_identity(ClockIdentity([5; 8]));
        let mut buffer = [0; MAX_DATA_LEN];
        let mut response_buffer = [0; MAX_DATA_LEN];

        let request_length = remote.start_pdelay_cycle(&mut buffer).unwrap();
        let result = port.handle_event_receive(
            &buffer[..request_length],
            Time::from_nanos(150),
            &mut response_buffer,
        );

        let transmit = result.transmit.expect("a response to send");
        let response = Message::deserialize(transmit).unwrap();
        let MessageBody::PDelayResp(body) = response.body else {
            panic!("wrong body type");
        };
        assert_eq!(
            Time::from(body.request_receipt_timestamp()),
            Time::from_nanos(150)
        );
    }

    fn test_port_with_identity(identity: ClockIdentity) -> TestPort {
        GptpPort::new(
            InstanceConfig::new(identity),
            PortConfig::default(),
            SyncConfig::default(),
            1,
            SimulatedHardwareClock::default(),
            SimulatedHardwareClock::default(),
            rand::rngs::mock::StepRng::new(2, 1),
        )
    }

    #[test]
    fn sync_and_follow_up_reach_the_servo() {
        let mut port = test_port();
        let mut master = test_port_with_identity(ClockIdentity([5; 8]));
        let mut buffer = [0; MAX_DATA_LEN];
        let mut response_buffer = [0; MAX_DATA_LEN];

        let (sequence_id, sync_length) = master.sync_message(&mut buffer).unwrap();
        let t0 = Time::from_nanos(5_000_000_000);
        let rx = t0 + Duration::from_nanos(40);
        port.handle_event_receive(&buffer[..sync_length], rx, &mut response_buffer);

        master
            .sync
            .clock_mut()
            .set_clock_time(t0)
            .unwrap();
        let follow_up_length = master.follow_up_message(sequence_id, &mut buffer).unwrap();
        port.handle_general_receive(&buffer[..follow_up_length]);

        let snapshot = port.observe();
        assert_eq!(snapshot.current_offset, Some(rx - t0));
        assert_eq!(snapshot.sync_statistics.follow_ups_processed, 1);
        assert_eq!(port.current_ds.offset_from_master, rx - t0);
    }

    #[test]
    fn link_asymmetry_corrects_the_offset() {
        let asymmetry = Duration::from_nanos(25);
        let mut port = GptpPort::new(
            InstanceConfig::new(ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8])),
            PortConfig {
                delay_asymmetry: asymmetry,
                ..PortConfig::default()
            },
            SyncConfig::default(),
            1,
            SimulatedHardwareClock::default(),
            SimulatedHardwareClock::default(),
            rand::rngs::mock::StepRng::new(2, 1),
        );
        let mut master = test_port_with_identity(ClockIdentity([5; 8]));
        let mut buffer = [0; MAX_DATA_LEN];
        let mut response_buffer = [0; MAX_DATA_LEN];

        let (sequence_id, sync_length) = master.sync_message(&mut buffer).unwrap();
        let t0 = Time::from_nanos(5_000_000_000);
        let rx = t0 + Duration::from_nanos(40);
        port.handle_event_receive(&buffer[..sync_length], rx, &mut response_buffer);

        master.sync.clock_mut().set_clock_time(t0).unwrap();
        let follow_up_length = master.follow_up_message(sequence_id, &mut buffer).unwrap();
        port.handle_general_receive(&buffer[..follow_up_length]);

        // the asymmetry is part of the master to slave delay
        assert_eq!(port.observe().current_offset, Some(rx - t0 - asymmetry));
    }

    #[test]
    fn sync_config_reaches_the_servo() {
        // with a tiny step threshold the 40ns offset is stepped, which the
        // default configuration would leave uncorrected
        let mut port = GptpPort::new(
            InstanceConfig::new(ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8])),
            PortConfig::default(),
            SyncConfig {
                min_offset_threshold: Duration::from_nanos(5),
                max_offset_threshold: Duration::from_nanos(10),
                ..SyncConfig::default()
            },
            1,
            SimulatedHardwareClock::default(),
            SimulatedHardwareClock::default(),
            rand::rngs::mock::StepRng::new(2, 1),
        );
        let mut master = test_port_with_identity(ClockIdentity([5; 8]));
        let mut buffer = [0; MAX_DATA_LEN];
        let mut response_buffer = [0; MAX_DATA_LEN];

        let (sequence_id, sync_length) = master.sync_message(&mut buffer).unwrap();
        let t0 = Time::from_nanos(5_000_000_000);
        port.handle_event_receive(
            &buffer[..sync_length],
            t0 + Duration::from_nanos(40),
            &mut response_buffer,
        );

        master.sync.clock_mut().set_clock_time(t0).unwrap();
        let follow_up_length = master.follow_up_message(sequence_id, &mut buffer).unwrap();
        port.handle_general_receive(&buffer[..follow_up_length]);

        assert_eq!(port.observe().sync_statistics.step_corrections, 1);
    }
}
