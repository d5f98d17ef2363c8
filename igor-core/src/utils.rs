// ABOUTME: Text helpers shared by channels with platform message size limits
// ABOUTME: Splits long replies at line and word boundaries, counting characters not bytes

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split a word that alone exceeds `max_chars` into fixed-size pieces.
fn hard_split(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Split long text into chunks no longer than `max_chars` characters,
/// preferring line breaks, then word breaks.
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        // If adding this line would exceed limit, save current chunk
        if !current.is_empty() && char_len(&current) + char_len(line) + 1 > max_chars {
            chunks.push(std::mem::take(&mut current).trim().to_string());
        }

        if char_len(line) > max_chars {
            // current was flushed above
            let mut line_part = String::new();
            for word in line.split_whitespace() {
                if char_len(word) > max_chars {
                    if !line_part.is_empty() {
                        chunks.push(std::mem::take(&mut line_part));
                    }
                    let mut pieces = hard_split(word, max_chars);
                    line_part = pieces.pop().unwrap_or_default();
                    chunks.extend(pieces);
                } else if char_len(&line_part) + char_len(word) + 1 > max_chars {
                    if !line_part.is_empty() {
                        chunks.push(line_part.trim().to_string());
                    }
                    line_part = word.to_string();
                } else {
                    if !line_part.is_empty() {
                        line_part.push(' ');
                    }
                    line_part.push_str(word);
                }
            }
            current = line_part;
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}
