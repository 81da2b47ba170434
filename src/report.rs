use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Monotonic stopwatch around the timed loop.
pub struct Timer(Instant);

impl Timer {
    pub fn start() -> Self {
        Timer(Instant::now())
    }

    pub fn stop(self) -> Duration {
        self.0.elapsed()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub duration: Duration,
    pub nops: u64,
}

impl Summary {
    pub fn new(duration: Duration, nops: u64) -> Self {
        Summary { duration, nops }
    }

    pub fn total_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    pub fn avg_ns_per_op(&self) -> f64 {
        if self.nops == 0 {
            0.0
        } else {
            self.duration.as_nanos() as f64 / self.nops as f64
        }
    }

    pub fn throughput(&self) -> f64 {
        if self.nops == 0 || self.duration.is_zero() {
            0.0
        } else {
            self.nops as f64 / self.duration.as_secs_f64()
        }
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "total benchmark runtime: {:.6} s", self.total_seconds())?;
        write!(f, "average operation latency: {:.6} ns", self.avg_ns_per_op())
    }
}
