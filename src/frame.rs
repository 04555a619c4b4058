//! A read-only view over an Ethernet frame.
//!
//! 以太网帧的只读视图。
//!
//! The relay never looks inside frames to decide where they go. This view
//! exists for diagnostics: it lets the device loop log addresses and the
//! ethertype of what it forwards.

use crate::config::ETHERNET_HEADER_LEN;
use bytes::Buf;
use std::fmt;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Returns `true` for the all-ones broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    /// Returns `true` when the group bit is set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Borrowed view of one Ethernet frame.
///
/// 一个以太网帧的借用视图。
#[derive(Debug, Clone, Copy)]
pub struct EthernetFrame<'a> {
    bytes: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    /// Wraps `bytes` if it is long enough to hold an Ethernet header.
    ///
    /// 如果 `bytes` 足够容纳以太网头，则包装它。
    pub fn parse(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < ETHERNET_HEADER_LEN {
            return None;
        }
        Some(Self { bytes })
    }

    /// The destination hardware address.
    pub fn destination(&self) -> MacAddr {
        Self::mac_at(self.bytes, 0)
    }

    /// The source hardware address.
    pub fn source(&self) -> MacAddr {
        Self::mac_at(self.bytes, 6)
    }

    /// The ethertype (or length, for 802.3 frames).
    pub fn ethertype(&self) -> u16 {
        let mut cursor = &self.bytes[12..ETHERNET_HEADER_LEN];
        cursor.get_u16()
    }

    /// Everything after the header.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[ETHERNET_HEADER_LEN..]
    }

    /// The whole frame.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn mac_at(bytes: &[u8], offset: usize) -> MacAddr {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&bytes[offset..offset + 6]);
        MacAddr(mac)
    }
}
