//! Shared configuration, constants and utilities for the telemetry agent crates.

pub mod config;
pub mod util;

use std::time::Duration;

/// Default port of the JSON-over-HTTP responder.
pub const HTTP_PORT: u16 = 9090;

/// Default port of the SNMP responder (unprivileged stand-in for 161).
pub const SNMP_PORT: u16 = 1611;

/// Default community string accepted by the SNMP responder.
pub const SNMP_COMMUNITY: &str = "public";

/// Default period between two sampler cycles.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(2_000);

/// Default bound on a single SNMP request/response round trip.
pub const SNMP_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Default enterprise arc under which the synthetic MIB is registered.
pub const MIB_BASE_OID: &str = "1.3.6.1.4.1.99999.1";

/// Default maximum length (in bytes) of an OctetString scalar (DisplayString size).
pub const MIB_STRING_MAX_LEN: usize = 255;
