//! VID:PID device filters
//!
//! Filter format: `"0xVID:0xPID"`, with `*` allowed on either side
//! (e.g. `"0x0a12:*"`). An empty filter list allows every device.

use anyhow::{Result, anyhow};

/// One parsed filter entry; `None` stands for the `*` wildcard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
}

impl DeviceFilter {
    /// Parse a `VID:PID` filter string
    pub fn parse(filter: &str) -> Result<Self> {
        let (vid, pid) = filter.split_once(':').ok_or_else(|| {
            anyhow!(
                "Invalid filter format '{}', expected VID:PID (e.g., '0x1234:0x5678' or '0x1234:*')",
                filter
            )
        })?;
        if pid.contains(':') {
            return Err(anyhow!(
                "Invalid filter format '{}', expected exactly one ':'",
                filter
            ));
        }

        Ok(Self {
            vendor_id: parse_part(vid, "VID")?,
            product_id: parse_part(pid, "PID")?,
        })
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id.is_none_or(|v| v == vendor_id)
            && self.product_id.is_none_or(|p| p == product_id)
    }
}

/// Parse every filter in `filters`, failing on the first bad one
pub fn parse_filters(filters: &[String]) -> Result<Vec<DeviceFilter>> {
    filters.iter().map(|f| DeviceFilter::parse(f)).collect()
}

/// Check if a VID/PID pair is allowed by the filters
pub fn is_allowed(vendor_id: u16, product_id: u16, filters: &[DeviceFilter]) -> bool {
    filters.is_empty() || filters.iter().any(|f| f.matches(vendor_id, product_id))
}

fn parse_part(part: &str, name: &str) -> Result<Option<u16>> {
    if part == "*" {
        return Ok(None);
    }

    let hex = part
        .strip_prefix("0x")
        .or_else(|| part.strip_prefix("0X"))
        .ok_or_else(|| {
            anyhow!(
                "Invalid {} '{}', must start with '0x' (e.g., '0x1234')",
                name,
                part
            )
        })?;

    if hex.is_empty() || hex.len() > 4 {
        return Err(anyhow!(
            "Invalid {} '{}', hex part must be 1-4 digits",
            name,
            part
        ));
    }

    u16::from_str_radix(hex, 16)
        .map(Some)
        .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, part))
}
