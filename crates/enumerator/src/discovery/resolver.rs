//! Identity resolution for one device-tree node
//!
//! Property policy:
//! - `assigned-address` gives the bus number and must hold exactly one value.
//! - `usb-num-configs` gives the configuration count; see [`NumConfigsPolicy`].
//! - The speed is the first of [`SPEED_PROPERTIES`] present on the node, in
//!   table order, and Full when none is.
//!
//! The device address is the number after the last `@` of the node path.

use crate::config::NumConfigsPolicy;
use crate::devtree::{DeviceNode, DeviceTree, IntProperty, prop_get_int};
use identity::{DeviceIdentity, DeviceSpeed, IdentityError, NodePath};
use tracing::{debug, info};

pub const BUS_NUMBER_PROPERTY: &str = "assigned-address";
pub const NUM_CONFIGS_PROPERTY: &str = "usb-num-configs";

/// Speed properties in priority order; the first one present wins
pub const SPEED_PROPERTIES: &[(&str, DeviceSpeed)] = &[
    ("low-speed", DeviceSpeed::Low),
    ("full-speed", DeviceSpeed::Full),
    ("high-speed", DeviceSpeed::High),
    ("super-speed", DeviceSpeed::Super),
];

/// Converts node paths into device identities
pub struct Resolver<'a, T: DeviceTree> {
    tree: &'a T,
    num_configs_policy: NumConfigsPolicy,
}

impl<'a, T: DeviceTree> Resolver<'a, T> {
    pub fn new(tree: &'a T, num_configs_policy: NumConfigsPolicy) -> Self {
        Self {
            tree,
            num_configs_policy,
        }
    }

    /// Derive the identity of the device at `path`
    ///
    /// The property session opened here is closed before returning, on
    /// success and on every discard.
    pub fn resolve(&self, path: &NodePath) -> Result<DeviceIdentity, IdentityError> {
        info!("device node \"{}\"", path);

        let node = self
            .tree
            .open(path)
            .map_err(|source| IdentityError::NodeUnavailable {
                path: path.to_string(),
                source,
            })?;

        let bus_number = prop_get_int(&node, BUS_NUMBER_PROPERTY)
            .value()
            .ok_or_else(|| IdentityError::MissingProperty {
                property: BUS_NUMBER_PROPERTY,
                path: path.to_string(),
            })?;

        let num_configs = match (
            prop_get_int(&node, NUM_CONFIGS_PROPERTY),
            self.num_configs_policy,
        ) {
            (IntProperty::Found(value), _) => value,
            (_, NumConfigsPolicy::DefaultOne) => {
                debug!("no usable {} on {}, assuming 1", NUM_CONFIGS_PROPERTY, path);
                1
            }
            (_, NumConfigsPolicy::Required) => {
                return Err(IdentityError::MissingProperty {
                    property: NUM_CONFIGS_PROPERTY,
                    path: path.to_string(),
                });
            }
        };

        let speed = classify_speed(&node);

        let unit_address = path
            .unit_address()
            .ok_or_else(|| IdentityError::NoUnitAddress {
                path: path.to_string(),
            })?;
        let device_address = parse_leading_int(unit_address);

        let identity = DeviceIdentity::new(
            fit_u8("bus_number", i64::from(bus_number), 0)?,
            fit_u8("device_address", device_address, 0)?,
            fit_u8("num_configs", i64::from(num_configs), 1)?,
            speed,
            path.clone(),
        );

        debug!(
            "busnum {} devaddr {} session_id {}",
            identity.bus_number(),
            identity.device_address(),
            identity.session_id()
        );
        Ok(identity)
    }
}

/// Speed of the first [`SPEED_PROPERTIES`] entry present on `node`
pub fn classify_speed<N: DeviceNode + ?Sized>(node: &N) -> DeviceSpeed {
    SPEED_PROPERTIES
        .iter()
        .find(|(name, _)| prop_get_int(node, name).is_present())
        .map(|(_, speed)| *speed)
        .unwrap_or_default()
}

/// Parse a leading decimal integer the way C `atoi` does
///
/// Skips leading whitespace, takes an optional sign, then digits up to the
/// first non-digit. No digits gives 0. Saturates instead of overflowing.
pub fn parse_leading_int(text: &str) -> i64 {
    let text = text.trim_start_matches([' ', '\t', '\n', '\u{0b}', '\u{0c}', '\r']);
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });

    if negative { -magnitude } else { magnitude }
}

fn fit_u8(field: &'static str, value: i64, min: i64) -> Result<u8, IdentityError> {
    let max = i64::from(u8::MAX);
    if value < min || value > max {
        return Err(IdentityError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value as u8)
}
