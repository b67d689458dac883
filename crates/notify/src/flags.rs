//! Changed-flag bit set delivered with every state-change notification.
//!
//! Bit positions follow the engine's `otChangedFlags` layout so values can be
//! passed through from the engine without translation.

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangedFlags(u32);

impl ChangedFlags {
    pub const NONE: Self = Self(0);
    pub const IP6_ADDRESS_ADDED: Self = Self(1 << 0);
    pub const IP6_ADDRESS_REMOVED: Self = Self(1 << 1);
    pub const THREAD_ROLE: Self = Self(1 << 2);
    pub const THREAD_LL_ADDR: Self = Self(1 << 3);
    pub const THREAD_ML_ADDR: Self = Self(1 << 4);
    pub const THREAD_RLOC_ADDED: Self = Self(1 << 5);
    pub const THREAD_RLOC_REMOVED: Self = Self(1 << 6);
    pub const THREAD_PARTITION_ID: Self = Self(1 << 7);
    pub const THREAD_KEY_SEQUENCE_COUNTER: Self = Self(1 << 8);
    pub const THREAD_NETDATA: Self = Self(1 << 9);
    pub const THREAD_CHILD_ADDED: Self = Self(1 << 10);
    pub const THREAD_CHILD_REMOVED: Self = Self(1 << 11);
    pub const IP6_MULTICAST_SUBSCRIBED: Self = Self(1 << 12);
    pub const IP6_MULTICAST_UNSUBSCRIBED: Self = Self(1 << 13);
    pub const THREAD_CHANNEL: Self = Self(1 << 14);
    pub const THREAD_PANID: Self = Self(1 << 15);
    pub const THREAD_NETWORK_NAME: Self = Self(1 << 16);
    pub const THREAD_EXT_PANID: Self = Self(1 << 17);
    pub const NETWORK_KEY: Self = Self(1 << 18);
    pub const PSKC: Self = Self(1 << 19);
    pub const SECURITY_POLICY: Self = Self(1 << 20);
    pub const CHANNEL_MANAGER_NEW_CHANNEL: Self = Self(1 << 21);
    pub const SUPPORTED_CHANNEL_MASK: Self = Self(1 << 22);
    pub const COMMISSIONER_STATE: Self = Self(1 << 23);
    pub const THREAD_NETIF_STATE: Self = Self(1 << 24);
    pub const BACKBONE_ROUTER_STATE: Self = Self(1 << 25);
    pub const BACKBONE_ROUTER_LOCAL: Self = Self(1 << 26);
    pub const JOINER_STATE: Self = Self(1 << 27);
    pub const ACTIVE_DATASET: Self = Self(1 << 28);
    pub const PENDING_DATASET: Self = Self(1 << 29);
    pub const NAT64_TRANSLATOR_STATE: Self = Self(1 << 30);
    pub const PARENT_LINK_QUALITY: Self = Self(1 << 31);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true when at least one bit of `other` is set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl From<u32> for ChangedFlags {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl BitOr for ChangedFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for ChangedFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl BitAnd for ChangedFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::LowerHex for ChangedFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for ChangedFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
