//! The `.25d` sidecar file: one fingerprint persisted next to its audio.
//!
//! Layout (little-endian, 120 bytes total):
//!
//! ```text
//! offset  size  field
//! 0       4     magic/version  (0x25D00001)
//! 4       8     sidecar mtime, seconds since the Unix epoch
//! 12      4     dimension count (must be 25)
//! 16      100   payload: 25 x f32 in canonical feature order
//! 116     4     CRC-32 (IEEE) over bytes 16..116
//! ```
//!
//! A sidecar is only trusted if the magic, dimension count, length and
//! CRC all check out *and* its recorded mtime is not older than the audio
//! file's mtime. Anything else is ignored and the fingerprint recomputed.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use auralis_core::{FEATURE_COUNT, Fingerprint};
use tracing::debug;

use crate::error::AnalysisError;

/// Magic/version word of the current sidecar format.
pub const SIDECAR_MAGIC: u32 = 0x25D0_0001;

/// Total sidecar size in bytes.
pub const SIDECAR_LEN: usize = 120;

const PAYLOAD_OFFSET: usize = 16;
const PAYLOAD_LEN: usize = FEATURE_COUNT * 4;

/// Sidecar path for an audio file: the audio filename with `.25d`
/// appended (`song.flac` -> `song.flac.25d`), so different containers of
/// the same stem never collide.
pub fn sidecar_path(audio_path: &Path) -> PathBuf {
    let mut name = audio_path.as_os_str().to_os_string();
    name.push(".25d");
    PathBuf::from(name)
}

/// Serialize a fingerprint into the 120-byte sidecar image.
pub fn encode(fingerprint: &Fingerprint, mtime_sec: u64) -> [u8; SIDECAR_LEN] {
    let mut out = [0u8; SIDECAR_LEN];
    out[0..4].copy_from_slice(&SIDECAR_MAGIC.to_le_bytes());
    out[4..12].copy_from_slice(&mtime_sec.to_le_bytes());
    out[12..16].copy_from_slice(&(FEATURE_COUNT as u32).to_le_bytes());
    for (i, v) in fingerprint.as_array().iter().enumerate() {
        let off = PAYLOAD_OFFSET + i * 4;
        out[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }
    let crc = crc32(&out[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN]);
    out[116..120].copy_from_slice(&crc.to_le_bytes());
    out
}

/// Parse and validate a sidecar image, returning the fingerprint and the
/// recorded mtime.
pub fn decode(bytes: &[u8]) -> Result<(Fingerprint, u64), AnalysisError> {
    if bytes.len() != SIDECAR_LEN {
        return Err(AnalysisError::BadLength(bytes.len()));
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if magic != SIDECAR_MAGIC {
        return Err(AnalysisError::VersionMismatch(magic));
    }
    let mtime = u64::from_le_bytes(bytes[4..12].try_into().unwrap());
    let dims = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
    if dims != FEATURE_COUNT as u32 {
        return Err(AnalysisError::DimensionMismatch(dims));
    }
    let stored = u32::from_le_bytes(bytes[116..120].try_into().unwrap());
    let computed = crc32(&bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN]);
    if stored != computed {
        return Err(AnalysisError::CrcFail { stored, computed });
    }

    let mut values = [0.0f32; FEATURE_COUNT];
    for (i, v) in values.iter_mut().enumerate() {
        let off = PAYLOAD_OFFSET + i * 4;
        *v = f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
    }
    Ok((Fingerprint::from_array(values), mtime))
}

/// Write a fingerprint sidecar next to `audio_path`, stamped with the
/// current time.
pub fn save_sidecar(audio_path: &Path, fingerprint: &Fingerprint) -> Result<PathBuf, AnalysisError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let path = sidecar_path(audio_path);
    std::fs::write(&path, encode(fingerprint, now)).map_err(|source| AnalysisError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Load the sidecar for `audio_path` if it exists and passes every check,
/// including staleness against the audio file's mtime.
///
/// Invalid sidecars are reported as `None` (with a debug log), never as
/// an error: the caller's recovery is always "recompute".
pub fn load_valid_sidecar(audio_path: &Path) -> Option<Fingerprint> {
    let path = sidecar_path(audio_path);
    let bytes = std::fs::read(&path).ok()?;
    match decode(&bytes) {
        Ok((fingerprint, sidecar_mtime)) => {
            let audio_mtime = std::fs::metadata(audio_path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())?;
            if sidecar_mtime < audio_mtime {
                debug!(?path, "sidecar is stale, ignoring");
                return None;
            }
            Some(fingerprint)
        }
        Err(err) => {
            debug!(?path, %err, "invalid sidecar, ignoring");
            None
        }
    }
}

/// CRC-32 (IEEE 802.3, reflected polynomial 0xEDB88320).
///
/// The payload is 100 bytes; a bitwise implementation keeps the format
/// self-contained with no table to carry around.
fn crc32(data: &[u8]) -> u32 {
    let mut crc = u32::MAX;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn crc32_check_value() {
        // Standard CRC-32 check vector.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn roundtrip_is_byte_identical() {
        let fp = Fingerprint::neutral();
        let bytes = encode(&fp, 1_700_000_000);
        assert_eq!(bytes.len(), SIDECAR_LEN);
        let (back, mtime) = decode(&bytes).unwrap();
        assert_eq!(back, fp);
        assert_eq!(mtime, 1_700_000_000);
    }

    #[test]
    fn payload_bit_flip_is_rejected() {
        let bytes = encode(&Fingerprint::neutral(), 0);
        for byte_index in PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN {
            let mut corrupt = bytes;
            corrupt[byte_index] ^= 0x01;
            assert!(
                matches!(decode(&corrupt), Err(AnalysisError::CrcFail { .. })),
                "flip at {byte_index} not caught"
            );
        }
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut bytes = encode(&Fingerprint::neutral(), 0);
        bytes[0] ^= 0xFF;
        assert!(matches!(decode(&bytes), Err(AnalysisError::VersionMismatch(_))));
    }

    #[test]
    fn wrong_dimension_count_rejected() {
        let mut bytes = encode(&Fingerprint::neutral(), 0);
        bytes[12..16].copy_from_slice(&24u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(AnalysisError::DimensionMismatch(24))));
    }

    #[test]
    fn truncated_file_rejected() {
        let bytes = encode(&Fingerprint::neutral(), 0);
        assert!(matches!(decode(&bytes[..119]), Err(AnalysisError::BadLength(119))));
    }

    #[test]
    fn save_and_load_through_the_filesystem() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("track.wav");
        std::fs::write(&audio, b"fake audio").unwrap();

        let fp = Fingerprint::neutral();
        let sidecar = save_sidecar(&audio, &fp).unwrap();
        assert_eq!(sidecar, dir.path().join("track.wav.25d"));

        let loaded = load_valid_sidecar(&audio).unwrap();
        assert_eq!(loaded, fp);
    }

    #[test]
    fn stale_sidecar_ignored() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("track.wav");
        std::fs::write(&audio, b"fake audio").unwrap();

        // Sidecar stamped well before the audio file's mtime.
        let path = sidecar_path(&audio);
        std::fs::write(&path, encode(&Fingerprint::neutral(), 1)).unwrap();
        assert!(load_valid_sidecar(&audio).is_none());
    }

    #[test]
    fn missing_sidecar_is_none() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("track.wav");
        std::fs::write(&audio, b"fake audio").unwrap();
        assert!(load_valid_sidecar(&audio).is_none());
    }
}
