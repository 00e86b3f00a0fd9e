use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use piece_tree::PieceTreeSnapshot;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::buffer::PieceTreeTextBuffer;
use crate::config::BuildOptions;
use crate::error::BufferResult;
use crate::source::DocumentSource;
use crate::PieceTreeTextBufferBuilder;

const READ_BLOCK_SIZE: usize = 64 * 1024;

pub fn load_from_path<P: AsRef<Path>>(
    path: P,
    options: &BuildOptions,
) -> BufferResult<PieceTreeTextBuffer> {
    let file = File::open(path.as_ref())?;
    debug!(path = %path.as_ref().display(), "loading document");
    load_from_reader(BufReader::new(file), options)
}

pub fn load_from_source(
    source: &dyn DocumentSource,
    options: &BuildOptions,
) -> BufferResult<PieceTreeTextBuffer> {
    load_from_reader(source.read()?, options)
}

/// Reads `reader` in 64 KiB blocks and feeds the builder. A character split
/// across two blocks is carried over to the next one.
pub fn load_from_reader<R: Read>(
    mut reader: R,
    options: &BuildOptions,
) -> BufferResult<PieceTreeTextBuffer> {
    let mut builder = PieceTreeTextBufferBuilder::new();
    let mut buf = vec![0u8; READ_BLOCK_SIZE];
    let mut carry: Vec<u8> = Vec::new();

    loop {
        let n = read_block(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }

        let mut combined = std::mem::take(&mut carry);
        combined.extend_from_slice(&buf[..n]);
        carry = accept_utf8(&mut builder, &combined);
    }

    if !carry.is_empty() {
        warn!(bytes = carry.len(), "malformed UTF-8 at end of input, decoding lossily");
        builder.accept_chunk(&String::from_utf8_lossy(&carry));
    }

    Ok(builder.finish(options))
}

/// Feeds every complete character of `bytes` and returns the incomplete tail.
fn accept_utf8(builder: &mut PieceTreeTextBufferBuilder, mut bytes: &[u8]) -> Vec<u8> {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                builder.accept_chunk(text);
                return Vec::new();
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                if let Ok(text) = std::str::from_utf8(valid) {
                    builder.accept_chunk(text);
                }
                match e.error_len() {
                    Some(len) => {
                        warn!(len, "replacing malformed UTF-8 sequence");
                        builder.accept_chunk(&String::from_utf8_lossy(&rest[..len]));
                        bytes = &rest[len..];
                    }
                    // partial character, wait for more input
                    None => return rest.to_vec(),
                }
            }
        }
    }
}

fn to_hex(hasher: Sha256) -> String {
    format!("{:x}", hasher.finalize())
}

/// Streams the buffer (BOM included) into `writer` and returns the SHA-256
/// hex digest of what was written.
pub fn save_to_writer<W: Write>(buffer: &PieceTreeTextBuffer, mut writer: W) -> BufferResult<String> {
    let mut snapshot = buffer.create_snapshot(true);
    let mut hasher = Sha256::new();
    let mut written = 0usize;
    while let Some(chunk) = snapshot.read() {
        hasher.update(chunk.as_bytes());
        writer.write_all(chunk.as_bytes())?;
        written += chunk.len();
    }
    writer.flush()?;
    debug!(bytes = written, "saved document");
    Ok(to_hex(hasher))
}

pub fn save_to_path<P: AsRef<Path>>(buffer: &PieceTreeTextBuffer, path: P) -> BufferResult<String> {
    let file = File::create(path.as_ref())?;
    save_to_writer(buffer, BufWriter::new(file))
}

pub fn save_to_source(
    buffer: &PieceTreeTextBuffer,
    source: &mut dyn DocumentSource,
) -> BufferResult<String> {
    save_to_writer(buffer, source.write()?)
}

/// One `read`, retried while it is interrupted.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// SHA-256 hex digest of a file's bytes.
pub fn hash_file<P: AsRef<Path>>(path: P) -> BufferResult<String> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BLOCK_SIZE];
    loop {
        let n = read_block(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(hasher))
}

/// Hashes `snapshot` on a background thread. The thread checks `cancel`
/// between chunks and yields `None` once it is set.
pub fn spawn_content_hash(
    mut snapshot: PieceTreeSnapshot,
    cancel: Arc<AtomicBool>,
) -> JoinHandle<Option<String>> {
    thread::spawn(move || {
        let mut hasher = Sha256::new();
        while let Some(chunk) = snapshot.read() {
            if cancel.load(Ordering::Relaxed) {
                debug!("content hash cancelled");
                return None;
            }
            hasher.update(chunk.as_bytes());
        }
        Some(to_hex(hasher))
    })
}
