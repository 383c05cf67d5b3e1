use super::error::GenerationError;

/// Concatenate per-chunk MP3 streams into a single stream.
///
/// Polly emits constant-bitrate MP3, so a frame-level concatenation in chunk
/// order is the lossless merge; there is no re-encode step. A single chunk is
/// returned byte-identical. Every chunk is validated first (ID3v2 tag skip +
/// frame sync check) so a corrupt chunk fails the whole merge instead of
/// producing broken audio.
pub fn merge_audio_chunks(chunks: &[Vec<u8>]) -> Result<Vec<u8>, GenerationError> {
    if chunks.is_empty() {
        tracing::error!("no audio chunks to merge");
        return Err(GenerationError::Merge);
    }

    for (index, chunk) in chunks.iter().enumerate() {
        if !is_valid_mp3(chunk) {
            tracing::error!(
                chunk_index = index,
                chunk_size = chunk.len(),
                chunk_count = chunks.len(),
                "audio chunk failed MP3 validation"
            );
            return Err(GenerationError::Merge);
        }
    }

    if chunks.len() == 1 {
        return Ok(chunks[0].clone());
    }

    let total: usize = chunks.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total);
    merged.extend_from_slice(&chunks[0]);
    for chunk in &chunks[1..] {
        // Only the leading chunk keeps its metadata tag, if any.
        merged.extend_from_slice(&chunk[id3v2_len(chunk)..]);
    }

    tracing::debug!(
        chunk_count = chunks.len(),
        merged_size = merged.len(),
        "audio chunks merged"
    );
    Ok(merged)
}

/// Byte length of a leading ID3v2 tag, or 0 when the stream starts with audio
/// frames. The tag size field is a 28-bit synchsafe integer.
fn id3v2_len(data: &[u8]) -> usize {
    if data.len() < 10 || &data[0..3] != b"ID3" {
        return 0;
    }
    let size = ((data[6] as usize & 0x7f) << 21)
        | ((data[7] as usize & 0x7f) << 14)
        | ((data[8] as usize & 0x7f) << 7)
        | (data[9] as usize & 0x7f);
    (10 + size).min(data.len())
}

fn is_valid_mp3(data: &[u8]) -> bool {
    let start = id3v2_len(data);
    let frame = &data[start..];
    // 11-bit frame sync, and a bitrate index that is neither "free" nor "bad".
    frame.len() >= 4
        && frame[0] == 0xFF
        && frame[1] & 0xE0 == 0xE0
        && frame[2] >> 4 != 0x0
        && frame[2] >> 4 != 0xF
}
