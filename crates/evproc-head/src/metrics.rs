//! Prometheus registry for dispatch outcomes, served on `/metrics`.
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

pub struct DispatchMetrics {
    registry: Registry,
    dispatched: IntCounterVec,
    run_seconds: Histogram,
}

impl DispatchMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let dispatched = IntCounterVec::new(
            Opts::new("evproc_messages_total", "Messages handled, by outcome"),
            &["outcome"],
        )?;
        let run_seconds = Histogram::with_opts(HistogramOpts::new(
            "evproc_pipeline_run_seconds",
            "Wall time of one pipeline run",
        ))?;

        registry.register(Box::new(dispatched.clone()))?;
        registry.register(Box::new(run_seconds.clone()))?;

        Ok(Self {
            registry,
            dispatched,
            run_seconds,
        })
    }

    pub fn record(&self, outcome: &str) {
        self.dispatched.with_label_values(&[outcome]).inc();
    }

    pub fn observe_run(&self, seconds: f64) {
        self.run_seconds.observe(seconds);
    }

    pub fn count(&self, outcome: &str) -> u64 {
        self.dispatched.with_label_values(&[outcome]).get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_encode() {
        let metrics = DispatchMetrics::new().unwrap();
        metrics.record("completed");
        metrics.record("completed");
        metrics.record("missing");
        metrics.observe_run(0.02);

        assert_eq!(metrics.count("completed"), 2);
        assert_eq!(metrics.count("failed"), 0);

        let text = metrics.encode().unwrap();
        assert!(text.contains("evproc_messages_total{outcome=\"completed\"} 2"));
        assert!(text.contains("evproc_pipeline_run_seconds_count 1"));
    }
}
