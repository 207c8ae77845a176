//! Capability availability report for a plan, without running any step.

use serde::Serialize;

use crate::probe::CapabilityProbe;
use crate::step::{Severity, Step};

/// One probed capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityCheck {
    pub step: String,
    pub capability: String,
    pub severity: Severity,
    pub available: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<CapabilityCheck>,
}

impl DoctorReport {
    pub fn available_count(&self) -> usize {
        self.checks.iter().filter(|c| c.available).count()
    }

    /// Every capability a fatal step needs is present.
    pub fn ready(&self) -> bool {
        self.checks
            .iter()
            .all(|c| c.available || c.severity == Severity::Advisory)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{}/{} capabilities available",
            self.available_count(),
            self.checks.len()
        )
    }

    /// One line per capability plus the summary line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for check in &self.checks {
            out.push_str(&format!(
                "{:.<14} {:<10} {}\n",
                check.step,
                check.capability,
                if check.available { "yes" } else { "no" }
            ));
        }
        out.push_str(&self.summary_line());
        out.push('\n');
        out
    }
}

/// Probe the capability of every step that declares one, in plan order.
pub fn run_doctor(steps: &[Step], probe: &dyn CapabilityProbe) -> DoctorReport {
    let checks = steps
        .iter()
        .filter_map(|step| {
            let capability = step.capability.as_ref()?;
            Some(CapabilityCheck {
                step: step.name.clone(),
                capability: capability.clone(),
                severity: step.severity,
                available: probe.is_available(capability),
            })
        })
        .collect();
    DoctorReport { checks }
}
