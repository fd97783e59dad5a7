#[allow(unused_imports)]
use crate::float_polyfill::FloatPolyfill;

/// Proportional gain of the frequency servo
pub(crate) const DEFAULT_KP: f64 = 0.7;
/// Integral gain of the frequency servo
pub(crate) const DEFAULT_KI: f64 = 0.3;
/// Bound on the accumulated error term, in nanoseconds
pub(crate) const INTEGRAL_LIMIT: f64 = 100_000_000.0;

/// A PI controller turning a measured time error into a rate correction.
///
/// The integral term is clamped so that a long stretch of one-sided errors
/// cannot wind the servo up beyond recovery.
#[derive(Debug, Clone)]
pub(crate) struct PiServo {
    kp: f64,
    ki: f64,
    integral_limit: f64,
    integral: f64,
}

impl Default for PiServo {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            ki: DEFAULT_KI,
            integral_limit: INTEGRAL_LIMIT,
            integral: 0.0,
        }
    }
}

impl PiServo {
    /// Feed one error sample in nanoseconds, returning the rate correction
    /// in parts per billion
    pub(crate) fn update(&mut self, error_nanos: f64) -> f64 {
        self.integral += error_nanos;
        if self.integral.abs() > self.integral_limit {
            self.integral = self.integral.signum() * self.integral_limit;
        }

        self.kp * error_nanos + self.ki * self.integral
    }

    pub(crate) fn reset(&mut self) {
        self.integral = 0.0;
    }
}
