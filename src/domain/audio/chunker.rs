/// AWS Polly accepts at most 3000 characters per synthesize request.
pub const POLLY_MAX_CHARS: usize = 3000;

/// Split text into chunks that fit within the per-request character ceiling,
/// preferring sentence boundaries so the audio sounds natural.
///
/// Pure function: same input always yields the same chunk sequence. Lengths
/// are counted in characters, matching Polly's limit semantics. Empty or
/// whitespace-only input returns an empty vector (callers reject empty text
/// before reaching the chunker); no returned chunk is ever empty or longer
/// than `max_chars`.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    // Normalize sentence terminators to one delimiter and split.
    let normalized = text.replace(['!', '?'], ".");

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in normalized.split('.') {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let sentence_len = sentence.chars().count();

        // +1: the terminator re-attached below counts against the ceiling, so
        // a sentence of exactly max_chars cannot be emitted whole either.
        if sentence_len + 1 > max_chars {
            // Oversized sentence: flush the running buffer to keep output in
            // input order, then fall back to packing whitespace tokens.
            if !current.is_empty() {
                chunks.push(current.trim_end().to_string());
                current.clear();
                current_len = 0;
            }
            pack_words(sentence, max_chars, &mut chunks);
            continue;
        }

        // +2 accounts for the ". " re-attached below.
        if current_len + sentence_len + 2 <= max_chars {
            current.push_str(sentence);
            current.push_str(". ");
            current_len += sentence_len + 2;
        } else {
            if !current.is_empty() {
                chunks.push(current.trim_end().to_string());
            }
            current = format!("{sentence}. ");
            current_len = sentence_len + 2;
        }
    }

    if !current.is_empty() {
        chunks.push(current.trim_end().to_string());
    }

    chunks
}

/// Greedily pack whitespace tokens of one oversized sentence. A single token
/// longer than the ceiling is hard-split on character boundaries.
fn pack_words(sentence: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let mut buffer = String::new();
    let mut buffer_len = 0usize;

    for word in sentence.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !buffer.is_empty() {
                chunks.push(buffer.trim_end().to_string());
                buffer.clear();
                buffer_len = 0;
            }
            let characters: Vec<char> = word.chars().collect();
            for piece in characters.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if buffer_len + word_len + 1 <= max_chars {
            buffer.push_str(word);
            buffer.push(' ');
            buffer_len += word_len + 1;
        } else {
            // A word exactly at the ceiling lands here with an empty buffer.
            if !buffer.is_empty() {
                chunks.push(buffer.trim_end().to_string());
            }
            buffer = format!("{word} ");
            buffer_len = word_len + 1;
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer.trim_end().to_string());
    }
}
