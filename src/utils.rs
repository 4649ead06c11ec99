#![allow(clippy::cast_sign_loss)]

const FALLBACK_PAGE_SIZE: usize = 4096;

/// Host page size, as reported by `sysconf(_SC_PAGESIZE)`.
#[must_use]
pub fn page_size() -> usize {
    let ret = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if ret <= 0 {
        FALLBACK_PAGE_SIZE
    } else {
        ret as usize
    }
}

#[must_use]
pub const fn align_up(val: u64, align: u64) -> u64 {
    (val + align - 1) & !(align - 1)
}

/// Parse a size the way module parameters are written: decimal, `0x` hex,
/// optionally followed by a `K`, `M` or `G` multiplier.
#[must_use]
pub fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim();
    let (digits, shift) = match s.as_bytes().last()? {
        b'k' | b'K' => (&s[..s.len() - 1], 10),
        b'm' | b'M' => (&s[..s.len() - 1], 20),
        b'g' | b'G' => (&s[..s.len() - 1], 30),
        _ => (s, 0),
    };

    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u64>().ok()?
    };

    value.checked_mul(1u64 << shift)
}
