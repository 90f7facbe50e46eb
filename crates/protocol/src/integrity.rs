//! Integrity envelope for configuration blobs
//!
//! A configuration blob is its JSON body prefixed with the CRC32 of that body,
//! written as eight lowercase hex digits:
//!
//! ```text
//! [CRC32: 8 hex chars][JSON body]
//! ```
//!
//! The checksum only catches truncation and corruption in transit. It is not
//! a signature and carries no authenticity guarantee.

use crate::error::{ProtocolError, Result};
use crc32fast::Hasher;

/// Length of the hex checksum prefix
pub const CHECKSUM_HEX_LEN: usize = 8;

/// Compute CRC32 checksum for data
#[inline]
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verify CRC32 checksum for data
#[inline]
pub fn verify_checksum(data: &[u8], expected_checksum: u32) -> bool {
    compute_checksum(data) == expected_checksum
}

/// Wrap a body in the checksum envelope
///
/// # Example
/// ```
/// use protocol::integrity::{open, seal};
///
/// let sealed = seal(r#"{"messages":[]}"#);
/// assert_eq!(open(&sealed).unwrap(), r#"{"messages":[]}"#);
/// ```
pub fn seal(body: &str) -> String {
    format!("{:08x}{}", compute_checksum(body.as_bytes()), body)
}

/// Check the envelope and return the body it carries
pub fn open(sealed: &str) -> Result<&str> {
    let prefix = sealed.get(..CHECKSUM_HEX_LEN).ok_or_else(|| {
        ProtocolError::InvalidConfig(format!(
            "expected at least {} bytes, got {}",
            CHECKSUM_HEX_LEN,
            sealed.len()
        ))
    })?;

    let expected = u32::from_str_radix(prefix, 16)
        .map_err(|e| ProtocolError::InvalidConfig(format!("bad checksum prefix: {}", e)))?;

    let body = &sealed[CHECKSUM_HEX_LEN..];
    if !verify_checksum(body.as_bytes(), expected) {
        return Err(ProtocolError::ChecksumMismatch {
            expected,
            actual: compute_checksum(body.as_bytes()),
        });
    }

    Ok(body)
}
