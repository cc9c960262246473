//! Bit-field extraction shared by every section field read.

/// Mask for 13-bit packet identifiers (top 3 bits reserved).
pub const PID_MASK: u16 = 0x1FFF;
/// Mask for 12-bit `section_length`, `program_info_length` and `ES_info_length`.
pub const LENGTH_MASK: u16 = 0x0FFF;
/// Keeps all 16 bits.
pub const FULL_MASK: u16 = 0xFFFF;

/// Combines two buffer bytes into a masked 16-bit value.
///
/// `first` holds the more significant byte and `second` the less significant
/// one. They need not be adjacent, which allows reading a field split around
/// an intervening block.
///
/// No bounds checking is done here; callers go through
/// [`SliceReader`](crate::slice_reader::SliceReader), which validates both
/// indices first.
#[inline]
pub fn masked_u16(buffer: &[u8], first: usize, second: usize, mask: u16) -> u16 {
    (((buffer[first] as u16) << 8) | buffer[second] as u16) & mask
}
