//! Timing-safe comparison, secret wiping and string obfuscation
//!
//! The XOR obfuscation is NOT encryption. A fixed single-byte key only keeps
//! strings out of a casual `strings` dump of the firmware image and offers no
//! confidentiality. Real secrets belong in a proper secret store.

use alloc::vec::Vec;

use log::warn;
use zeroize::Zeroize;

use crate::config::Capabilities;

/// Single-byte XOR key used by [`obfuscate`]
pub const OBFUSCATION_KEY: u8 = 0x5A;

/// XOR every byte with [`OBFUSCATION_KEY`].
pub fn obfuscate(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ OBFUSCATION_KEY).collect()
}

/// Inverse of [`obfuscate`] (XOR is its own inverse).
pub fn deobfuscate(input: &[u8]) -> Vec<u8> {
    obfuscate(input)
}

/// Compare two byte strings without an early exit.
///
/// Walks the longer of the two lengths, padding the shorter with zeros, and
/// only then checks the accumulated difference and the lengths.
pub fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    let max_len = a.len().max(b.len());
    let mut diff: u8 = 0;

    for i in 0..max_len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= core::hint::black_box(x ^ y);
    }

    (diff == 0) & (a.len() == b.len())
}

/// Overwrite a buffer holding secret material with zeros.
pub fn secure_zero(buf: &mut [u8]) {
    buf.zeroize();
}

/// Record a security-relevant event. Only emitted on debug builds of the
/// device configuration, so production logs do not leak request details.
pub fn log_security_event(capabilities: &Capabilities, event: &str, details: &str) {
    if capabilities.debug_mode {
        warn!(target: "security", "[SECURITY] {}: {}", event, details);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_compare() {
        assert!(secure_compare(b"abc", b"abc"));
        assert!(!secure_compare(b"abc", b"abd"));
        assert!(!secure_compare(b"ab", b"abc"));
        assert!(!secure_compare(b"abc", b"ab"));
        assert!(secure_compare(b"", b""));
    }

    #[test]
    fn test_secure_compare_zero_padding_does_not_match() {
        // The shorter input is padded with zeros, the length check still rejects
        assert!(!secure_compare(b"ab", b"ab\0"));
    }

    #[test]
    fn test_obfuscation_round_trip() {
        let secret = b"awcms2024";
        let hidden = obfuscate(secret);
        assert_ne!(hidden.as_slice(), secret);
        assert_eq!(hidden[0], b'a' ^ OBFUSCATION_KEY);
        assert_eq!(deobfuscate(&hidden).as_slice(), secret);
    }

    #[test]
    fn test_secure_zero() {
        let mut buf = *b"password";
        secure_zero(&mut buf);
        assert_eq!(buf, [0u8; 8]);
    }
}
