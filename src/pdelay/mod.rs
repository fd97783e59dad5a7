//! Peer path delay measurement, *IEEE 802.1AS-2021 section 11.2.19*
//!
//! One engine instance measures the propagation delay of a single link with
//! the two-step peer delay mechanism, and answers the requests of the peer
//! on the same link. The host drives the cycle: it transmits the requests
//! the engine builds, feeds back responses, and delivers timeouts.

use crate::{
    datastructures::{
        common::PortIdentity,
        messages::{
            Header, Message, PDelayRespFollowUpMessage, PDelayRespMessage,
        },
    },
    datastructures::datasets::DefaultDS,
    hardware::HardwareClock,
    time::{Duration, Time},
};

/// State of one in-flight request cycle
#[derive(Debug, Clone, Copy)]
struct InFlight {
    sequence_id: u16,
    /// t2 and t4 arrive with the response, t3 with its follow up
    response: Option<ResponseTimes>,
}

#[derive(Debug, Clone, Copy)]
struct ResponseTimes {
    request_receipt: Time,
    response_rx: Time,
}

/// The timestamps of the last completed exchange, kept for the neighbor
/// rate ratio
#[derive(Debug, Clone, Copy)]
struct CompletedExchange {
    response_origin: Time,
    response_rx: Time,
}

/// Counters and gauges of the engine, snapshotted by value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathDelayStatistics {
    pub cycles_completed: u64,
    pub responses_ignored: u64,
    pub lost_responses: u64,
    /// |new − previous| of the two most recent measurements
    pub delay_variation: Option<Duration>,
}

/// See the [module documentation](`crate::pdelay`).
#[derive(Debug)]
pub struct PathDelayEngine<H> {
    clock: H,
    port_identity: PortIdentity,
    allowed_lost: u32,
    sequence_id: u16,
    in_flight: Option<InFlight>,
    consecutive_lost: u32,
    mean_path_delay: Option<Duration>,
    measurement_valid: bool,
    last_exchange: Option<CompletedExchange>,
    neighbor_rate_ratio: Option<f64>,
    /// t2 of a request we answered, waiting for our own t3 capture
    pending_response: Option<Header>,
    statistics: PathDelayStatistics,
}

impl<H: HardwareClock> PathDelayEngine<H> {
    /// `allowed_lost` is the number of consecutive lost responses tolerated
    /// before the measurement turns stale
    pub fn new(clock: H, port_identity: PortIdentity, allowed_lost: u32) -> Self {
        Self {
            clock,
            port_identity,
            allowed_lost,
            sequence_id: 0,
            in_flight: None,
            consecutive_lost: 0,
            mean_path_delay: None,
            measurement_valid: false,
            last_exchange: None,
            neighbor_rate_ratio: None,
            pending_response: None,
            statistics: PathDelayStatistics::default(),
        }
    }

    /// The most recent measurement, or `None` while it is stale
    pub fn mean_path_delay(&self) -> Option<Duration> {
        self.measurement_valid.then_some(self.mean_path_delay).flatten()
    }

    pub fn is_measurement_valid(&self) -> bool {
        self.measurement_valid
    }

    /// The relative rate of the peer clock against ours, derived from two
    /// successive completed exchanges
    pub fn neighbor_rate_ratio(&self) -> Option<f64> {
        self.neighbor_rate_ratio
    }

    pub fn statistics(&self) -> PathDelayStatistics {
        self.statistics
    }

    pub(crate) fn clock_mut(&mut self) -> &mut H {
        &mut self.clock
    }

    /// Begin a measurement cycle, returning the request to transmit.
    ///
    /// A cycle still in flight counts as lost; the protocol allows only one
    /// outstanding request per link.
    pub(crate) fn start_cycle(&mut self, default_ds: &DefaultDS) -> Message<'static> {
        if self.in_flight.is_some() {
            self.register_loss();
        }

        self.sequence_id = self.sequence_id.wrapping_add(1);
        self.in_flight = Some(InFlight {
            sequence_id: self.sequence_id,
            response: None,
        });

        Message::pdelay_req(default_ds, self.port_identity, self.sequence_id)
    }

    /// Handle a Pdelay_Resp addressed to this link.
    ///
    /// `response_rx` is t4, the arrival timestamp of the response. Responses
    /// for another requester or a stale sequence id are ignored, counted but
    /// harmless.
    pub(crate) fn handle_response(&mut self, response: &PDelayRespMessage, header: &Header, response_rx: Time) {
        if response.requesting_port_identity() != self.port_identity {
            self.statistics.responses_ignored += 1;
            log::trace!("pdelay response for another port, ignoring");
            return;
        }

        let Some(in_flight) = self.in_flight.as_mut() else {
            self.statistics.responses_ignored += 1;
            return;
        };
        if header.sequence_id != in_flight.sequence_id {
            self.statistics.responses_ignored += 1;
            log::trace!("pdelay response with stale sequence id, ignoring");
            return;
        }

        in_flight.response = Some(ResponseTimes {
            request_receipt: response.request_receipt_timestamp().into(),
            response_rx,
        });
    }

    /// Handle the Pdelay_Resp_Follow_Up that completes a cycle
    pub(crate) fn handle_response_follow_up(
        &mut self,
        follow_up: &PDelayRespFollowUpMessage,
        header: &Header,
    ) {
        if follow_up.requesting_port_identity() != self.port_identity {
            self.statistics.responses_ignored += 1;
            return;
        }

        let Some(in_flight) = self.in_flight else {
            self.statistics.responses_ignored += 1;
            return;
        };
        let (Some(times), true) = (in_flight.response, header.sequence_id == in_flight.sequence_id)
        else {
            self.statistics.responses_ignored += 1;
            return;
        };

        // t1 only becomes available once the hardware saw the request leave
        let request_tx = match self.clock.capture_tx_timestamp(in_flight.sequence_id) {
            Ok(timestamp) => timestamp,
            Err(error) => {
                log::error!("request tx timestamp unavailable: {:?}", error);
                self.register_loss();
                self.in_flight = None;
                return;
            }
        };

        let response_origin: Time = follow_up.response_origin_timestamp().into();
        self.complete_cycle(
            request_tx,
            times.request_receipt,
            response_origin,
            times.response_rx,
        );
        self.in_flight = None;
    }

    fn complete_cycle(&mut self, t1: Time, t2: Time, t3: Time, t4: Time) {
        let round_trip = t4 - t1;
        let turnaround = t3 - t2;

        // scale the peer's turnaround into our timebase when the rate
        // ratio of the link is known
        let turnaround_nanos = match self.neighbor_rate_ratio {
            Some(ratio) => (turnaround.nanos() as f64 / ratio) as i64,
            None => turnaround.nanos(),
        };

        let mut delay_nanos = (round_trip.nanos() - turnaround_nanos) / 2;
        if delay_nanos < 0 {
            log::warn!("negative path delay {} measured, clamping to zero", delay_nanos);
            delay_nanos = 0;
        }
        let delay = Duration::from_nanos(delay_nanos);

        self.statistics.delay_variation = self
            .mean_path_delay
            .map(|previous| (delay - previous).abs());
        self.mean_path_delay = Some(delay);
        self.measurement_valid = true;
        self.consecutive_lost = 0;
        self.statistics.cycles_completed += 1;

        if let Some(previous) = self.last_exchange {
            let local = (t4 - previous.response_rx).nanos();
            let remote = (t3 - previous.response_origin).nanos();
            if local > 0 && remote > 0 {
                self.neighbor_rate_ratio = Some(remote as f64 / local as f64);
            }
        }
        self.last_exchange = Some(CompletedExchange {
            response_origin: t3,
            response_rx: t4,
        });

        log::debug!("mean path delay {}", delay);
    }

    /// The response timeout fired with the cycle incomplete
    pub fn handle_timeout(&mut self) {
        if self.in_flight.take().is_some() {
            self.register_loss();
        }
    }

    fn register_loss(&mut self) {
        self.statistics.lost_responses += 1;
        self.consecutive_lost += 1;

        if self.consecutive_lost > self.allowed_lost {
            if self.measurement_valid {
                log::warn!("too many lost pdelay responses, measurement is stale");
            }
            self.measurement_valid = false;
        }
    }

    /// Answer the Pdelay_Req of the peer.
    ///
    /// `request_rx` is t2. The response carries it back; the matching follow
    /// up is produced by [`handle_response_sent`](`Self::handle_response_sent`)
    /// once our transmit hardware captured t3.
    pub(crate) fn handle_request(&mut self, request_header: &Header, request_rx: Time) -> Message<'static> {
        self.pending_response = Some(*request_header);
        Message::pdelay_resp(*request_header, self.port_identity, request_rx)
    }

    /// Our response left the wire; build the follow up carrying t3
    pub(crate) fn handle_response_sent(&mut self, sequence_id: u16) -> Option<Message<'static>> {
        let request_header = self.pending_response.take()?;
        if request_header.sequence_id != sequence_id {
            log::debug!("response sent notification for unknown sequence id");
            return None;
        }

        let response_tx = match self.clock.capture_tx_timestamp(sequence_id) {
            Ok(timestamp) => timestamp,
            Err(error) => {
                log::error!("response tx timestamp unavailable: {:?}", error);
                return None;
            }
        };

        Some(Message::pdelay_resp_follow_up(
            request_header,
            self.port_identity,
            response_tx,
        ))
    }

    /// Stop measuring. Equivalent to [`reset`](`Self::reset`).
    pub fn stop(&mut self) {
        self.reset();
    }

    /// Drop the in-flight cycle, rate ratio history and responder state.
    /// Idempotent.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.pending_response = None;
        self.last_exchange = None;
        self.neighbor_rate_ratio = None;
        self.consecutive_lost = 0;
        self.measurement_valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::InstanceConfig,
        datastructures::{common::ClockIdentity, messages::MessageBody},
        hardware::SimulatedHardwareClock,
    };

    fn test_default_ds() -> DefaultDS {
        DefaultDS::new(InstanceConfig::new(ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8])))
    }

    fn test_engine() -> PathDelayEngine<SimulatedHardwareClock> {
        let port_identity = PortIdentity {
            clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
            port_number: 1,
        };
        PathDelayEngine::new(SimulatedHardwareClock::default(), port_identity, 3)
    }

    /// Runs one full request/response/follow-up cycle against a scripted
    /// peer, with all four timestamps given in nanoseconds.
    fn run_cycle(
        engine: &mut PathDelayEngine<SimulatedHardwareClock>,
        t1: u64,
        t2: u64,
        t3: u64,
        t4: u64,
    ) {
        let default_ds = test_default_ds();

        // the simulated clock returns its current time as t1
        engine.clock_mut().set_clock_time(Time::from_nanos(t1)).unwrap();
        let request = engine.start_cycle(&default_ds);
        let sequence_id = request.header().sequence_id;

        let response = PDelayRespMessage {
            request_receipt_timestamp: Time::from_nanos(t2).into(),
            requesting_port_identity: engine.port_identity,
        };
        let response_header = Header {
            sequence_id,
            ..Default::default()
        };
        engine.handle_response(&response, &response_header, Time::from_nanos(t4));

        let follow_up = PDelayRespFollowUpMessage {
            response_origin_timestamp: Time::from_nanos(t3).into(),
            requesting_port_identity: engine.port_identity,
        };
        engine.handle_response_follow_up(&follow_up, &response_header);
    }

    #[test]
    fn classic_four_timestamp_arithmetic() {
        let mut engine = test_engine();
        run_cycle(&mut engine, 100, 150, 160, 220);

        assert_eq!(engine.mean_path_delay(), Some(Duration::from_nanos(55)));
        assert!(engine.is_measurement_valid());
        assert_eq!(engine.statistics().cycles_completed, 1);
    }

    #[test]
    fn foreign_responses_are_ignored() {
        let mut engine = test_engine();
        let default_ds = test_default_ds();
        let request = engine.start_cycle(&default_ds);

        let response = PDelayRespMessage {
            request_receipt_timestamp: Time::from_nanos(150).into(),
            requesting_port_identity: PortIdentity {
                clock_identity: ClockIdentity([9; 8]),
                port_number: 3,
            },
        };
        let header = Header {
            sequence_id: request.header().sequence_id,
            ..Default::default()
        };
        engine.handle_response(&response, &header, Time::from_nanos(220));

        assert_eq!(engine.statistics().responses_ignored, 1);
        assert!(!engine.is_measurement_valid());
    }

    #[test]
    fn lost_responses_invalidate_and_recover() {
        let mut engine = test_engine();
        run_cycle(&mut engine, 100, 150, 160, 220);
        assert!(engine.is_measurement_valid());

        let default_ds = test_default_ds();
        for _ in 0..3 {
            let _ = engine.start_cycle(&default_ds);
            engine.handle_timeout();
            assert!(engine.is_measurement_valid());
        }

        // one more than allowed
        let _ = engine.start_cycle(&default_ds);
        engine.handle_timeout();
        assert!(!engine.is_measurement_valid());
        assert_eq!(engine.mean_path_delay(), None);

        // a single fresh cycle restores the measurement
        run_cycle(&mut engine, 1100, 1150, 1160, 1220);
        assert!(engine.is_measurement_valid());
        assert_eq!(engine.mean_path_delay(), Some(Duration::from_nanos(55)));
    }

    #[test]
    fn loss_tolerance_is_configurable() {
        let port_identity = PortIdentity {
            clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
            port_number: 1,
        };
        let mut engine =
            PathDelayEngine::new(SimulatedHardwareClock::default(), port_identity, 1);
        run_cycle(&mut engine, 100, 150, 160, 220);

        let default_ds = test_default_ds();
        let _ = engine.start_cycle(&default_ds);
        engine.handle_timeout();
        assert!(engine.is_measurement_valid());

        let _ = engine.start_cycle(&default_ds);
        engine.handle_timeout();
        assert!(!engine.is_measurement_valid());
    }

    #[test]
    fn rate_ratio_from_successive_exchanges() {
        let mut engine = test_engine();
        run_cycle(&mut engine, 100, 150, 160, 220);
        assert_eq!(engine.neighbor_rate_ratio(), None);

        // peer elapsed exactly as much as we did: ratio 1
        run_cycle(&mut engine, 1100, 1150, 1160, 1220);
        assert_eq!(engine.neighbor_rate_ratio(), Some(1.0));
    }

    #[test]
    fn responder_side_echoes_the_requester() {
        let mut engine = test_engine();
        let requester = PortIdentity {
            clock_identity: ClockIdentity([7; 8]),
            port_number: 2,
        };
        let request_header = Header {
            source_port_identity: requester,
            sequence_id: 11,
            ..Default::default()
        };

        let response = engine.handle_request(&request_header, Time::from_nanos(5000));
        assert_eq!(response.header().sequence_id, 11);
        let MessageBody::PDelayResp(body) = response.body else {
            panic!("wrong body type");
        };
        assert_eq!(body.requesting_port_identity(), requester);
        assert_eq!(Time::from(body.request_receipt_timestamp()), Time::from_nanos(5000));

        engine.clock_mut().set_clock_time(Time::from_nanos(5500)).unwrap();
        let follow_up = engine.handle_response_sent(11).unwrap();
        let MessageBody::PDelayRespFollowUp(body) = follow_up.body else {
            panic!("wrong body type");
        };
        assert_eq!(body.requesting_port_identity(), requester);
        assert_eq!(Time::from(body.response_origin_timestamp()), Time::from_nanos(5500));

        // the pending state is consumed
        assert!(engine.handle_response_sent(11).is_none());
    }

    #[test]
    fn negative_delay_is_clamped() {
        let mut engine = test_engine();
        // the peer claims a turnaround longer than our round trip
        run_cycle(&mut engine, 100, 150, 260, 220);

        assert_eq!(engine.mean_path_delay(), Some(Duration::ZERO));
    }
}
