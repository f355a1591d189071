//! Shared constants and domain helpers for the catalog protocol.
//!
//! The conversions here form the compile-time contract between client and
//! server: both sides compare memory quantities in bits, and both sides
//! agree on the upload size cap, so the helpers live in the core crate
//! rather than in either binary.

use crate::proto::{Device, Filter, Memory, memory};

/// Hard cap on the cumulative byte size of one uploaded asset.
pub const MAX_ASSET_SIZE: usize = 1 << 20;

/// Role permitted to mutate the catalog.
pub const ROLE_ADMIN: &str = "admin";

/// Role permitted to rate devices but not mutate the catalog.
pub const ROLE_USER: &str = "user";

impl Memory {
    /// Normalizes this quantity to bits.
    ///
    /// Each unit is a power-of-two multiple of a bit, so the conversion is
    /// an exact left shift: byte = 2^3, kilobyte = 2^13, megabyte = 2^23,
    /// gigabyte = 2^33, terabyte = 2^43. An unrecognized unit normalizes
    /// to zero and therefore never satisfies a minimum-memory bound.
    pub fn to_bits(&self) -> u64 {
        let value = self.value;

        match self.unit() {
            memory::Unit::Bit => value,
            memory::Unit::Byte => value << 3,
            memory::Unit::Kilobyte => value << 13,
            memory::Unit::Megabyte => value << 23,
            memory::Unit::Gigabyte => value << 33,
            memory::Unit::Terabyte => value << 43,
            memory::Unit::Unknown => 0,
        }
    }
}

impl Filter {
    /// Returns true when the device satisfies every bound of this filter:
    /// price at most `max_price_usd`, at least `min_cpu_cores` cores, clock
    /// speed at least `min_cpu_ghz`, and memory (normalized to bits) at
    /// least `min_ram`.
    ///
    /// Absent sub-messages behave like their zero values, matching proto3
    /// getter semantics.
    pub fn matches(&self, device: &Device) -> bool {
        if device.price_usd > self.max_price_usd {
            return false;
        }

        let (cores, ghz) = device
            .cpu
            .as_ref()
            .map_or((0, 0.0), |cpu| (cpu.number_cores, cpu.min_ghz));

        if cores < self.min_cpu_cores {
            return false;
        }

        if ghz < self.min_cpu_ghz {
            return false;
        }

        let ram_bits = device.ram.as_ref().map_or(0, Memory::to_bits);
        let min_bits = self.min_ram.as_ref().map_or(0, Memory::to_bits);

        ram_bits >= min_bits
    }
}
