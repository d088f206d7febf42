//! Startup-time capability detection.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use devtools_primitives::{CapabilityId, CapabilitySet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::panic_message;

/// A capability probe failed. Non-fatal: the capability is treated as absent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("capability probe `{probe}` failed: {reason}")]
pub struct ProbeError {
    probe: String,
    reason: String,
}

impl ProbeError {
    /// Creates a probe failure for the named probe.
    #[must_use]
    pub fn new(probe: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            probe: probe.into(),
            reason: reason.into(),
        }
    }

    /// Returns the name of the failed probe.
    #[must_use]
    pub fn probe(&self) -> &str {
        &self.probe
    }

    /// Returns the failure reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Inspects the host process for the presence of one optional subsystem.
pub trait CapabilityProbe: Send + Sync {
    /// Capability reported when the probe succeeds with `true`.
    fn capability(&self) -> &CapabilityId;

    /// Probes the host. Must not have side effects.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the host cannot be inspected; the detector
    /// treats that as "capability absent".
    fn probe(&self) -> Result<bool, ProbeError>;
}

/// Probe backed by a closure.
pub struct FnProbe<F> {
    capability: CapabilityId,
    check: F,
}

impl<F> FnProbe<F>
where
    F: Fn() -> Result<bool, ProbeError> + Send + Sync,
{
    /// Wraps a closure as a probe for `capability`.
    pub fn new(capability: CapabilityId, check: F) -> Self {
        Self { capability, check }
    }
}

impl<F> fmt::Debug for FnProbe<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProbe")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

impl<F> CapabilityProbe for FnProbe<F>
where
    F: Fn() -> Result<bool, ProbeError> + Send + Sync,
{
    fn capability(&self) -> &CapabilityId {
        &self.capability
    }

    fn probe(&self) -> Result<bool, ProbeError> {
        (self.check)()
    }
}

/// Runs a fixed list of probes and collects the capabilities that hold.
#[derive(Default)]
pub struct CapabilityDetector {
    probes: Vec<Box<dyn CapabilityProbe>>,
}

impl fmt::Debug for CapabilityDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDetector")
            .field(
                "probes",
                &self
                    .probes
                    .iter()
                    .map(|probe| probe.capability().as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CapabilityDetector {
    /// Creates a detector without probes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a probe.
    #[must_use]
    pub fn with_probe<P>(mut self, probe: P) -> Self
    where
        P: CapabilityProbe + 'static,
    {
        self.probes.push(Box::new(probe));
        self
    }

    /// Adds a probe after construction.
    pub fn push<P>(&mut self, probe: P)
    where
        P: CapabilityProbe + 'static,
    {
        self.probes.push(Box::new(probe));
    }

    /// Evaluates every probe once.
    ///
    /// A probe that errors or panics is logged and its capability is left out
    /// of the set; detection itself never fails.
    #[must_use]
    pub fn detect(&self) -> CapabilitySet {
        let mut detected = CapabilitySet::new();
        for probe in &self.probes {
            let capability = probe.capability();
            let outcome = catch_unwind(AssertUnwindSafe(|| probe.probe())).unwrap_or_else(
                |payload| {
                    Err(ProbeError::new(
                        capability.as_str(),
                        panic_message(payload.as_ref()),
                    ))
                },
            );
            match outcome {
                Ok(true) => {
                    debug!(%capability, "capability detected");
                    detected.insert(capability.clone());
                }
                Ok(false) => debug!(%capability, "capability absent"),
                Err(err) => warn!(%capability, error = %err, "capability probe failed; treating as absent"),
            }
        }
        detected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> CapabilityId {
        CapabilityId::new(value).unwrap()
    }

    #[test]
    fn collects_successful_probes() {
        let detector = CapabilityDetector::new()
            .with_probe(FnProbe::new(id("routingA"), || Ok(true)))
            .with_probe(FnProbe::new(id("routingB"), || Ok(false)));

        let caps = detector.detect();
        assert!(caps.contains(&id("routingA")));
        assert!(!caps.contains(&id("routingB")));
    }

    #[test]
    fn failing_and_panicking_probes_are_absent() {
        let detector = CapabilityDetector::new()
            .with_probe(FnProbe::new(id("routingA"), || {
                Err(ProbeError::new("routingA", "no route table registered"))
            }))
            .with_probe(FnProbe::new(id("routingB"), || -> Result<bool, ProbeError> {
                panic!("route table lookup exploded")
            }))
            .with_probe(FnProbe::new(id("health"), || Ok(true)));

        let caps = detector.detect();
        assert_eq!(caps.len(), 1);
        assert!(caps.contains_str("health"));
    }
}
