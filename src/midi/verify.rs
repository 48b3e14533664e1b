// SMF Verification - Byte-level Standard MIDI File reader
// Deliberately shares nothing with midly so exported files are checked by a second parser

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Missing MThd header chunk")]
    MissingHeader,

    #[error("Truncated MIDI data: {0}")]
    Truncated(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Track {track}: {reason}")]
    MalformedTrack { track: usize, reason: String },

    #[error("Header declares {declared} tracks but {found} were found")]
    TrackCountMismatch { declared: u16, found: usize },
}

/// Structural summary of a verified file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmfSummary {
    pub format: u16,
    pub track_count: usize,
    /// Raw division word (ticks per quarter when the top bit is clear)
    pub division: u16,
    /// Note-on events with non-zero velocity
    pub note_on_count: usize,
    pub controller_count: usize,
    /// Longest track length in ticks
    pub max_track_ticks: u64,
}

fn truncated(err: std::io::Error) -> VerifyError {
    VerifyError::Truncated(err.to_string())
}

/// Walk every chunk and event of an SMF and report its structure
pub fn verify_smf(bytes: &[u8]) -> Result<SmfSummary, VerifyError> {
    let mut cursor = Cursor::new(bytes);

    let mut id = [0u8; 4];
    cursor.read_exact(&mut id).map_err(|_| VerifyError::MissingHeader)?;
    if &id != b"MThd" {
        return Err(VerifyError::MissingHeader);
    }

    let header_len = cursor.read_u32::<BigEndian>().map_err(truncated)? as u64;
    if header_len < 6 {
        return Err(VerifyError::InvalidHeader(format!("header length {}", header_len)));
    }
    let format = cursor.read_u16::<BigEndian>().map_err(truncated)?;
    let declared_tracks = cursor.read_u16::<BigEndian>().map_err(truncated)?;
    let division = cursor.read_u16::<BigEndian>().map_err(truncated)?;
    if format > 2 {
        return Err(VerifyError::InvalidHeader(format!("format {}", format)));
    }
    if format == 0 && declared_tracks != 1 {
        return Err(VerifyError::InvalidHeader(format!(
            "format 0 with {} tracks",
            declared_tracks
        )));
    }
    if division == 0 {
        return Err(VerifyError::InvalidHeader("zero division".to_string()));
    }
    cursor.set_position(8 + header_len);

    let mut summary = SmfSummary {
        format,
        track_count: 0,
        division,
        note_on_count: 0,
        controller_count: 0,
        max_track_ticks: 0,
    };

    let total = bytes.len() as u64;
    while cursor.position() < total {
        cursor.read_exact(&mut id).map_err(truncated)?;
        let len = cursor.read_u32::<BigEndian>().map_err(truncated)? as u64;
        let start = cursor.position();
        if start + len > total {
            return Err(VerifyError::Truncated(format!(
                "chunk {:?} declares {} bytes, {} remain",
                String::from_utf8_lossy(&id),
                len,
                total - start
            )));
        }

        // Unknown chunk types are skipped
        if &id == b"MTrk" {
            let data = &bytes[start as usize..(start + len) as usize];
            verify_track(data, summary.track_count, &mut summary)?;
            summary.track_count += 1;
        }
        cursor.set_position(start + len);
    }

    if summary.track_count != declared_tracks as usize {
        return Err(VerifyError::TrackCountMismatch {
            declared: declared_tracks,
            found: summary.track_count,
        });
    }

    Ok(summary)
}

fn read_vlq(cursor: &mut Cursor<&[u8]>) -> Result<u32, String> {
    let mut value: u32 = 0;
    for _ in 0..4 {
        let byte = cursor.read_u8().map_err(|_| "truncated variable-length quantity".to_string())?;
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err("variable-length quantity longer than 4 bytes".to_string())
}

fn read_data_byte(cursor: &mut Cursor<&[u8]>) -> Result<u8, String> {
    let byte = cursor.read_u8().map_err(|_| "truncated channel message".to_string())?;
    if byte & 0x80 != 0 {
        return Err(format!("status byte {:#04x} where data was expected", byte));
    }
    Ok(byte)
}

fn skip(cursor: &mut Cursor<&[u8]>, len: u32) -> Result<(), String> {
    let end = cursor.position() + len as u64;
    if end > cursor.get_ref().len() as u64 {
        return Err("event payload runs past end of track".to_string());
    }
    cursor.set_position(end);
    Ok(())
}

fn verify_track(data: &[u8], track: usize, summary: &mut SmfSummary) -> Result<(), VerifyError> {
    let malformed = |reason: String| VerifyError::MalformedTrack { track, reason };

    let mut cursor = Cursor::new(data);
    let mut running_status: Option<u8> = None;
    let mut ticks: u64 = 0;

    loop {
        if cursor.position() >= data.len() as u64 {
            return Err(malformed("missing End-of-Track".to_string()));
        }

        ticks += read_vlq(&mut cursor).map_err(malformed)? as u64;

        let first = cursor.read_u8().map_err(|_| malformed("truncated event".to_string()))?;
        let (status, first_data) = if first & 0x80 != 0 {
            (first, None)
        } else {
            match running_status {
                Some(status) => (status, Some(first)),
                None => return Err(malformed("data byte without running status".to_string())),
            }
        };

        match status {
            0xFF => {
                let meta_type = cursor.read_u8().map_err(|_| malformed("truncated meta event".to_string()))?;
                let len = read_vlq(&mut cursor).map_err(malformed)?;
                skip(&mut cursor, len).map_err(malformed)?;
                if meta_type == 0x2F {
                    if cursor.position() != data.len() as u64 {
                        return Err(malformed("bytes after End-of-Track".to_string()));
                    }
                    break;
                }
            }
            0xF0 | 0xF7 => {
                running_status = None;
                let len = read_vlq(&mut cursor).map_err(malformed)?;
                skip(&mut cursor, len).map_err(malformed)?;
            }
            0x80..=0xEF => {
                running_status = Some(status);
                if first_data.is_none() {
                    read_data_byte(&mut cursor).map_err(malformed)?;
                }
                let kind = status & 0xF0;
                let d2 = if kind == 0xC0 || kind == 0xD0 {
                    None
                } else {
                    Some(read_data_byte(&mut cursor).map_err(malformed)?)
                };

                match (kind, d2) {
                    (0x90, Some(vel)) if vel > 0 => summary.note_on_count += 1,
                    (0xB0, _) => summary.controller_count += 1,
                    _ => {}
                }
            }
            other => {
                return Err(malformed(format!("unexpected status byte {:#04x}", other)));
            }
        }
    }

    summary.max_track_ticks = summary.max_track_ticks.max(ticks);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(format: u16, tracks: u16) -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&format.to_be_bytes());
        bytes.extend_from_slice(&tracks.to_be_bytes());
        bytes.extend_from_slice(&480u16.to_be_bytes());
        bytes
    }

    fn track(body: &[u8]) -> Vec<u8> {
        let mut bytes = b"MTrk".to_vec();
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_minimal_file_verifies() {
        let mut bytes = header(0, 1);
        // note on, running-status note off (vel 0), end of track
        bytes.extend(track(&[
            0x00, 0x90, 60, 100,
            0x83, 0x60, 60, 0,
            0x00, 0xFF, 0x2F, 0x00,
        ]));

        let summary = verify_smf(&bytes).unwrap();
        assert_eq!(summary.format, 0);
        assert_eq!(summary.track_count, 1);
        assert_eq!(summary.note_on_count, 1);
        assert_eq!(summary.max_track_ticks, 480);
    }

    #[test]
    fn test_missing_end_of_track_rejected() {
        let mut bytes = header(0, 1);
        bytes.extend(track(&[0x00, 0x90, 60, 100]));
        assert!(matches!(verify_smf(&bytes), Err(VerifyError::MalformedTrack { .. })));
    }

    #[test]
    fn test_track_count_mismatch_rejected() {
        let mut bytes = header(1, 2);
        bytes.extend(track(&[0x00, 0xFF, 0x2F, 0x00]));
        assert!(matches!(
            verify_smf(&bytes),
            Err(VerifyError::TrackCountMismatch { declared: 2, found: 1 })
        ));
    }

    #[test]
    fn test_truncated_chunk_rejected() {
        let mut bytes = header(0, 1);
        bytes.extend(track(&[0x00, 0xFF, 0x2F, 0x00]));
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(verify_smf(&bytes), Err(VerifyError::Truncated(_))));
    }

    #[test]
    fn test_data_without_running_status_rejected() {
        let mut bytes = header(0, 1);
        bytes.extend(track(&[0x00, 60, 100, 0x00, 0xFF, 0x2F, 0x00]));
        assert!(matches!(verify_smf(&bytes), Err(VerifyError::MalformedTrack { .. })));
    }

    #[test]
    fn test_not_midi_rejected() {
        assert!(matches!(verify_smf(b"RIFF...."), Err(VerifyError::MissingHeader)));
    }
}
