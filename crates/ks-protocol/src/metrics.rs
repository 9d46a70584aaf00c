use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Bus traffic counters shared by every channel of a run
#[derive(Clone)]
pub struct ProtocolMetrics {
    pub commands_sent: IntCounter,
    pub status_reads: IntCounter,
    pub stale_reads: IntCounter,
    pub faults: IntCounter,
}

impl ProtocolMetrics {
    /// Create the counters and register them with `registry`.
    ///
    /// Fails if the registry already holds counters under the same names.
    pub fn register(registry: &Registry) -> Result<Self, String> {
        let counter = |name: &str, help: &str| {
            let c = IntCounter::new(name, help).map_err(|e| format!("metrics init error: {e}"))?;
            registry
                .register(Box::new(c.clone()))
                .map_err(|e| format!("registering {name}: {e}"))?;
            Ok::<_, String>(c)
        };
        Ok(Self {
            commands_sent: counter("ks_commands_sent", "Total commands written")?,
            status_reads: counter("ks_status_reads", "Total status blocks read")?,
            stale_reads: counter(
                "ks_stale_reads",
                "Status blocks whose operation id did not match",
            )?,
            faults: counter("ks_device_faults", "Correlated status blocks reporting a fault")?,
        })
    }
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub protocol: ProtocolMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let protocol = ProtocolMetrics::register(&registry)?;
        Ok(Self { registry, protocol })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_counters_are_exported() -> Result<(), String> {
        let hub = MetricsHub::new()?;
        hub.protocol.faults.inc();
        let text = hub.encode_text();
        for name in [
            "ks_commands_sent 0",
            "ks_status_reads 0",
            "ks_stale_reads 0",
            "ks_device_faults 1",
        ] {
            assert!(text.contains(name), "{name} missing from:\n{text}");
        }
        Ok(())
    }

    #[test]
    fn duplicate_registration_is_reported() -> Result<(), String> {
        let hub = MetricsHub::new()?;
        let err = ProtocolMetrics::register(&hub.registry).err();
        assert!(err.is_some_and(|e| e.contains("ks_commands_sent")));
        Ok(())
    }
}
