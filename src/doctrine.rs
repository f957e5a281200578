//! Static phase doctrine for the reconnaissance workflow.
//!
//! This module provides:
//! - `PhaseDefinition` describing one investigative phase
//! - The fixed table of seven phases (0-6)
//! - `lookup` for bounds-checked access by phase number

use serde::Serialize;

use crate::errors::ConfigurationError;

/// Number of phases in an operation. `current_phase == PHASE_COUNT` means
/// the operation is complete.
pub const PHASE_COUNT: usize = 7;

/// Doctrine for a single phase: what it must achieve and which technique
/// categories the generated commands may draw on.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PhaseDefinition {
    pub phase_number: usize,
    pub name: &'static str,
    pub objectives: &'static [&'static str],
    pub technique_categories: &'static [&'static str],
}

static DOCTRINE: [PhaseDefinition; PHASE_COUNT] = [
    PhaseDefinition {
        phase_number: 0,
        name: "Event Horizon Framing",
        objectives: &[
            "Authority Surface Isolation",
            "Temporal Ownership Compression",
            "Semantic Drift Mapping",
            "Registrar Behavior Fingerprinting",
        ],
        technique_categories: &[
            "WHOIS registrar analysis",
            "Historical ownership records",
            "DNS semantic variation analysis",
            "Registration pattern fingerprinting",
        ],
    },
    PhaseDefinition {
        phase_number: 1,
        name: "Inertial Enumeration",
        objectives: &[
            "Historical Resolution Echoes",
            "Cross-Zone Naming Symmetry",
            "Delegation Entropy Analysis",
            "Operational Laziness Exploitation",
        ],
        technique_categories: &[
            "Passive DNS historical analysis",
            "Subzone enumeration via public records",
            "NS delegation pattern analysis",
            "Infrastructure reuse detection",
        ],
    },
    PhaseDefinition {
        phase_number: 2,
        name: "Temporal Parallax",
        objectives: &[
            "Resolution Latency Phase-Shift",
            "TTL Personality Profiling",
            "Propagation Asymmetry Detection",
            "Maintenance Window Inference",
        ],
        technique_categories: &[
            "DNS resolution timing analysis",
            "TTL variation fingerprinting",
            "Geographic propagation analysis",
            "Maintenance pattern detection",
        ],
    },
    PhaseDefinition {
        phase_number: 3,
        name: "Infrastructure Skeletonization",
        objectives: &[
            "Shared Fate Correlation",
            "Negative Space Cartography",
            "Protocol Behavior Residue",
            "Fallback Path Reconstruction",
        ],
        technique_categories: &[
            "IP infrastructure correlation",
            "Unused subnet analysis",
            "Service fingerprinting via passive data",
            "Failover path reconstruction",
        ],
    },
    PhaseDefinition {
        phase_number: 4,
        name: "Control Plane Inference",
        objectives: &[
            "Update Velocity Measurement",
            "Rollback Signature Detection",
            "Blast Radius Estimation",
            "Control-Key Shadowing (outcome only)",
        ],
        technique_categories: &[
            "DNS change frequency analysis",
            "Configuration rollback detection",
            "Impact radius calculation",
            "Control plane inference",
        ],
    },
    PhaseDefinition {
        phase_number: 5,
        name: "Adversarial Posture Modeling",
        objectives: &[
            "Countermeasure Reflex Profiling",
            "Decoy Discrimination",
            "Sensor Placement Inference",
            "Escalation Threshold Mapping",
        ],
        technique_categories: &[
            "Security posture analysis",
            "Honeypot/decoy detection",
            "Sensor network mapping",
            "Response threshold analysis",
        ],
    },
    PhaseDefinition {
        phase_number: 6,
        name: "Predictive Namespace Dominance",
        objectives: &[
            "Future Domain Pre-Image Modeling",
            "Lifecycle Exhaust Mapping",
            "Strategic Choke Anticipation",
            "Deterministic Collapse Triggering (outcome only)",
        ],
        technique_categories: &[
            "Future domain prediction",
            "Lifecycle pattern analysis",
            "Chokepoint identification",
            "Collapse prediction modeling",
        ],
    },
];

/// Look up the doctrine for a phase.
///
/// Fails with `ConfigurationError::PhaseOutOfRange` for anything outside 0-6.
pub fn lookup(phase_number: usize) -> Result<&'static PhaseDefinition, ConfigurationError> {
    DOCTRINE
        .get(phase_number)
        .ok_or(ConfigurationError::PhaseOutOfRange(phase_number))
}

/// All phase definitions in execution order.
pub fn all_phases() -> &'static [PhaseDefinition] {
    &DOCTRINE
}
