//! Per-call deadline polling.
//!
//! gRPC carries a call's deadline in the `grpc-timeout` metadata entry.
//! Handlers parse it once into a [`CallDeadline`] and poll it cooperatively
//! at defined points (before a store write, before each streamed send,
//! before each streamed receive). Cancellation is never preemptive:
//! in-flight work between poll points runs to completion. Client aborts are
//! observed separately, as receive/send failures at the same points.

use std::time::{Duration, Instant};

use gadget_tonic_core::{Error, Result};
use tonic::metadata::MetadataMap;

/// Optional deadline for one call, derived from its `grpc-timeout` metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallDeadline(Option<Instant>);

impl CallDeadline {
    /// Reads the call deadline from request metadata. A missing or
    /// unparseable `grpc-timeout` entry yields a deadline-free call.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        let timeout = metadata
            .get("grpc-timeout")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout);

        Self(timeout.map(|t| Instant::now() + t))
    }

    /// Fails with `DeadlineExceeded` once the deadline has passed.
    pub fn check(&self) -> Result<()> {
        match self.0 {
            Some(deadline) if Instant::now() > deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    pub fn exceeded(&self) -> bool {
        self.check().is_err()
    }
}

/// Parses the wire format of `grpc-timeout`: ASCII digits followed by a
/// single unit letter (`H`, `M`, `S`, `m`, `u`, `n`).
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 {
        return None;
    }

    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount.checked_mul(3600)?)),
        "M" => Some(Duration::from_secs(amount.checked_mul(60)?)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}
