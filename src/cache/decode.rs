use crate::address;

/// An address split into its cache coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decoded {
    /// Address with the block offset bits cleared.
    pub block_addr: address,
    pub set: usize,
    pub tag: address,
    /// Tag and set bits, used for fast equality checks.
    pub tagset: address,
}

pub trait AddressTranslation: std::fmt::Debug + Send + Sync + 'static {
    /// Compute block address for an address.
    #[must_use]
    fn block_addr(&self, addr: address) -> address;

    /// Compute set index for an address.
    #[must_use]
    fn set_index(&self, addr: address) -> usize;

    /// Compute cache block tag for an address.
    #[must_use]
    fn tag(&self, addr: address) -> address;

    /// Compute the combined tag and set bits for an address.
    #[must_use]
    fn tagset(&self, addr: address) -> address;

    /// Reconstruct the block address from a tag and its set.
    #[must_use]
    fn block_addr_of(&self, tag: address, set: usize) -> address;

    #[inline]
    #[must_use]
    fn decode(&self, addr: address) -> Decoded {
        Decoded {
            block_addr: self.block_addr(addr),
            set: self.set_index(addr),
            tag: self.tag(addr),
            tagset: self.tagset(addr),
        }
    }
}

/// Linear set indexing using the bits directly above the block offset.
///
/// ```text
/// | tag | set | offset |
///       ^     ^
///       |     set_shift = log2(block size)
///       tag_shift = set_shift + log2(num sets)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Linear {
    pub block_mask: address,
    pub set_shift: u32,
    pub set_mask: address,
    pub tag_shift: u32,
    pub tag_mask: address,
    pub tagset_mask: address,
}

impl Linear {
    /// Both arguments must be powers of two.
    #[must_use]
    pub fn new(num_sets: usize, block_size: u32) -> Self {
        debug_assert!(num_sets.is_power_of_two());
        debug_assert!(block_size.is_power_of_two());
        let block_mask = address::from(block_size) - 1;
        let set_shift = block_size.ilog2();
        let set_mask = num_sets as address - 1;
        let tag_shift = set_shift + num_sets.ilog2();
        debug_assert!(tag_shift < address::BITS);
        Self {
            block_mask,
            set_shift,
            set_mask,
            tag_shift,
            tag_mask: address::MAX >> tag_shift,
            tagset_mask: !block_mask,
        }
    }

    /// Byte offset of an address within its block.
    #[inline]
    #[must_use]
    pub fn block_offset(&self, addr: address) -> usize {
        (addr & self.block_mask) as usize
    }
}

impl AddressTranslation for Linear {
    #[inline]
    fn block_addr(&self, addr: address) -> address {
        addr & !self.block_mask
    }

    #[inline]
    fn set_index(&self, addr: address) -> usize {
        ((addr >> self.set_shift) & self.set_mask) as usize
    }

    #[inline]
    fn tag(&self, addr: address) -> address {
        (addr >> self.tag_shift) & self.tag_mask
    }

    #[inline]
    fn tagset(&self, addr: address) -> address {
        addr & self.tagset_mask
    }

    #[inline]
    fn block_addr_of(&self, tag: address, set: usize) -> address {
        (tag << self.tag_shift) | ((set as address) << self.set_shift)
    }
}

#[cfg(test)]
mod tests {
    use super::{AddressTranslation, Decoded, Linear};

    #[test]
    fn test_decode() {
        // 128 sets, 32 byte blocks
        let decoder = Linear::new(128, 32);
        assert_eq!(decoder.set_shift, 5);
        assert_eq!(decoder.tag_shift, 12);

        let addr = 0x0001_2345;
        assert_eq!(
            decoder.decode(addr),
            Decoded {
                block_addr: 0x0001_2340,
                set: 0x1a,
                tag: 0x12,
                tagset: 0x0001_2340,
            }
        );
        assert_eq!(decoder.block_offset(addr), 5);
    }

    #[test]
    fn test_set_index_is_periodic() {
        let decoder = Linear::new(64, 64);
        let period = 64 * 64;
        for addr in [0, 1, 63, 64, 4095, 0xdead_beef, u64::MAX - period] {
            let a = decoder.decode(addr);
            let b = decoder.decode(addr + period);
            assert_eq!(a.set, b.set, "addr={addr:#x}");
            assert_eq!(a.tag + 1, b.tag, "addr={addr:#x}");
        }
    }

    #[test]
    fn test_block_addr_of_inverts_decode() {
        let decoder = Linear::new(256, 64);
        let addr = 0xffff_0000_1234_5678;
        let decoded = decoder.decode(addr);
        assert_eq!(
            decoder.block_addr_of(decoded.tag, decoded.set),
            decoded.block_addr
        );
    }

    #[test]
    fn test_single_set() {
        let decoder = Linear::new(1, 64);
        assert_eq!(decoder.set_index(0x1234), 0);
        assert_eq!(decoder.tag(256), 4);
        assert_eq!(decoder.tagset(256 + 17), 256);
    }
}
