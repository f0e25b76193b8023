//! Append-only journal backing a durable [`RecordStore`](crate::RecordStore).
//!
//! Every committed batch is written as one frame, so a batch is either fully
//! on disk or not at all.
//!
//! # Frame Format
//!
//! ```text
//! [FRAME_START:u32][length:u32][payload:bytes][crc32:u32][FRAME_END:u32]
//!        4B            4B         variable        4B          4B
//! ```
//!
//! All integers are little-endian. The CRC covers the start sentinel, the
//! length and the payload. The payload is a JSON [`JournalEntry`].
//!
//! A crash mid-write leaves a damaged final frame. Recovery truncates such a
//! tail and keeps everything before it; damage anywhere else is reported as
//! corruption.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Mutation, StoreError, StoreResult};

const FRAME_START: u32 = 0xBE7D_0C5A;
const FRAME_END: u32 = 0x5EA1_ED00;

// start(4) + length(4)
const HEADER_SIZE: usize = 8;

// crc(4) + end(4)
const TRAILER_SIZE: usize = 8;

/// One committed batch as persisted in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct JournalEntry {
    pub seq: u64,
    pub mutations: Vec<Mutation>,
}

pub(crate) struct Journal {
    path: PathBuf,
    file: File,
    len: u64,
    sync_writes: bool,
}

impl Journal {
    /// Opens (or creates) the journal at `path` and returns every intact
    /// entry together with the byte offset of its frame.
    pub fn open(path: &Path, sync_writes: bool) -> StoreResult<(Self, Vec<(u64, JournalEntry)>)> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let (entries, valid_len) = replay(path, &data)?;

        if valid_len < data.len() {
            warn!(
                path = %path.display(),
                kept = valid_len,
                dropped = data.len() - valid_len,
                "truncating torn journal tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), entries = entries.len(), "journal opened");

        Ok((
            Self {
                path: path.to_path_buf(),
                file,
                len: valid_len as u64,
                sync_writes,
            },
            entries,
        ))
    }

    /// Appends one entry. On failure the file is rolled back to its previous length.
    pub fn append(&mut self, entry: &JournalEntry) -> StoreResult<()> {
        let payload = serde_json::to_vec(entry).map_err(|e| StoreError::Encode(e.to_string()))?;
        let frame = encode_frame(&payload);

        if let Err(e) = self.write_frame(&frame) {
            if let Err(rollback) = self.file.set_len(self.len) {
                warn!(path = %self.path.display(), error = %rollback, "journal rollback failed");
            }
            return Err(e.into());
        }

        self.len += frame.len() as u64;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.file.write_all(frame)?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }
}

fn replay(path: &Path, data: &[u8]) -> StoreResult<(Vec<(u64, JournalEntry)>, usize)> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        match decode_frame(&data[pos..]) {
            Ok((payload, consumed)) => {
                let entry: JournalEntry =
                    serde_json::from_slice(payload).map_err(|e| StoreError::Corrupted {
                        path: path.to_path_buf(),
                        position: pos as u64,
                        reason: format!("undecodable entry: {e}"),
                    })?;
                entries.push((pos as u64, entry));
                pos += consumed;
            }
            Err(FrameError::Truncated) => break,
            Err(FrameError::Damaged { reason, frame_len }) => {
                let reaches_end = frame_len.is_some_and(|len| pos + len >= data.len());
                if reaches_end {
                    break;
                }
                return Err(StoreError::Corrupted {
                    path: path.to_path_buf(),
                    position: pos as u64,
                    reason,
                });
            }
        }
    }

    Ok((entries, pos))
}

#[derive(Debug, PartialEq, Eq)]
enum FrameError {
    /// Fewer bytes than the frame needs.
    Truncated,
    /// The bytes are there but do not check out.
    Damaged {
        reason: String,
        frame_len: Option<usize>,
    },
}

fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    buf.extend_from_slice(&FRAME_START.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    let crc = crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&FRAME_END.to_le_bytes());
    buf
}

fn decode_frame(data: &[u8]) -> Result<(&[u8], usize), FrameError> {
    if data.len() < HEADER_SIZE {
        return Err(FrameError::Truncated);
    }

    let start = read_u32(&data[0..4]);
    if start != FRAME_START {
        return Err(FrameError::Damaged {
            reason: format!("bad start sentinel {start:#010x}"),
            frame_len: None,
        });
    }

    let length = read_u32(&data[4..8]) as usize;
    let total = HEADER_SIZE + length + TRAILER_SIZE;
    if data.len() < total {
        return Err(FrameError::Truncated);
    }

    let crc_at = HEADER_SIZE + length;
    let stored = read_u32(&data[crc_at..crc_at + 4]);
    let computed = crc32(&data[..crc_at]);
    if stored != computed {
        return Err(FrameError::Damaged {
            reason: format!("crc mismatch: stored {stored:#010x}, computed {computed:#010x}"),
            frame_len: Some(total),
        });
    }

    let end = read_u32(&data[crc_at + 4..total]);
    if end != FRAME_END {
        return Err(FrameError::Damaged {
            reason: format!("bad end sentinel {end:#010x}"),
            frame_len: Some(total),
        });
    }

    Ok((&data[HEADER_SIZE..crc_at], total))
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

// IEEE 802.3 CRC32, reflected polynomial.
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFF;
    for &byte in data {
        crc = (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    crc ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn frame_decodes_what_it_encodes() {
        let frame = encode_frame(b"payload");
        let (payload, consumed) = decode_frame(&frame).unwrap();
        assert_eq!(payload, b"payload");
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn short_frame_is_truncated() {
        let frame = encode_frame(b"payload");
        assert_eq!(
            decode_frame(&frame[..frame.len() - 1]),
            Err(FrameError::Truncated)
        );
        assert_eq!(decode_frame(&frame[..3]), Err(FrameError::Truncated));
    }

    #[test]
    fn flipped_payload_bit_is_damage() {
        let mut frame = encode_frame(b"payload");
        frame[HEADER_SIZE] ^= 0x01;
        assert!(matches!(
            decode_frame(&frame),
            Err(FrameError::Damaged { frame_len: Some(_), .. })
        ));
    }

    #[test]
    fn append_then_reopen_returns_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.log");

        let (mut journal, entries) = Journal::open(&path, true).unwrap();
        assert!(entries.is_empty());
        journal
            .append(&JournalEntry {
                seq: 1,
                mutations: Vec::new(),
            })
            .unwrap();
        journal
            .append(&JournalEntry {
                seq: 2,
                mutations: Vec::new(),
            })
            .unwrap();
        let len = journal.len();
        drop(journal);

        let (journal, entries) = Journal::open(&path, false).unwrap();
        assert_eq!(entries.iter().map(|(_, e)| e.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(journal.len(), len);
    }

    #[test]
    fn torn_tail_is_truncated_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.log");

        let (mut journal, _) = Journal::open(&path, false).unwrap();
        journal
            .append(&JournalEntry {
                seq: 1,
                mutations: Vec::new(),
            })
            .unwrap();
        let good_len = journal.len();
        drop(journal);

        // Simulate a crash halfway through the second frame.
        let partial = encode_frame(br#"{"seq":2,"mutations":[]}"#);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&partial[..partial.len() / 2]).unwrap();
        drop(file);

        let (journal, entries) = Journal::open(&path, false).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(journal.len(), good_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
    }

    #[test]
    fn damage_before_tail_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.log");

        let (mut journal, _) = Journal::open(&path, false).unwrap();
        for seq in 1..=2 {
            journal
                .append(&JournalEntry {
                    seq,
                    mutations: Vec::new(),
                })
                .unwrap();
        }
        drop(journal);

        let mut data = fs::read(&path).unwrap();
        data[HEADER_SIZE] ^= 0xFF;
        fs::write(&path, data).unwrap();

        assert!(matches!(
            Journal::open(&path, false),
            Err(StoreError::Corrupted { position: 0, .. })
        ));
    }
}
