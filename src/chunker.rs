//! Token-bounded text chunker that breaks at sentence and paragraph boundaries.
//!
//! The chunker operates on a whitespace-attached token stream: each token is
//! a maximal run of non-whitespace characters together with the whitespace
//! that follows it, so concatenating all tokens reproduces the input exactly.
//! Any tokenizer consistent with the embedding model would do; what matters
//! is the chunk semantics, not the token boundaries.
//!
//! Each step takes a window of at most `token_limit` tokens, truncates it at
//! the last sentence end inside the window (unless the window already reaches
//! the end of the input), and advances the cursor by exactly the tokens the
//! chunk consumed. Advancing by the full window instead would silently drop
//! the text between the sentence break and the window end.

/// Splits `text` into whitespace-attached tokens partitioning the input.
///
/// A token starts at each non-whitespace character preceded by whitespace
/// (or at the start of the input) and runs until the next token start, so it
/// carries its trailing whitespace. Leading whitespace forms a token of its
/// own. `tokenize("a b").concat() == "a b"` holds for every input.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut prev_ws = false;

    for (i, ch) in text.char_indices() {
        if i > 0 && prev_ws && !ch.is_whitespace() {
            tokens.push(&text[start..i]);
            start = i;
        }
        prev_ws = ch.is_whitespace();
    }
    if !text.is_empty() {
        tokens.push(&text[start..]);
    }

    tokens
}

/// Number of tokens `text` re-encodes to.
pub fn token_count(text: &str) -> usize {
    tokenize(text).len()
}

/// True when the token closes a sentence or a paragraph: its word ends with
/// `.`, `?`, or `!`, or its trailing whitespace holds a newline.
fn is_sentence_end(token: &str) -> bool {
    let word = token.trim_end();
    if word.ends_with(['.', '?', '!']) {
        return true;
    }
    token[word.len()..].contains('\n')
}

/// Splits `text` into chunks of at most `token_limit` tokens, preferring to
/// end each chunk at a sentence or paragraph boundary.
///
/// Chunks are overlap-free and cover the input completely: every token lands
/// in exactly one window, and only windows that clean down to nothing (pure
/// whitespace) are dropped. Internal newlines are replaced with spaces and
/// the result trimmed, so no produced chunk is empty or whitespace-only.
pub fn chunk_text(text: &str, token_limit: usize) -> Vec<String> {
    debug_assert!(token_limit > 0);

    let tokens = tokenize(text);
    let mut chunks = Vec::new();
    let mut cursor = 0;

    while cursor < tokens.len() {
        let window_end = usize::min(cursor + token_limit, tokens.len());
        let mut take = window_end - cursor;

        // Truncate at a natural break only when more input remains; the
        // final window keeps everything.
        if window_end < tokens.len() {
            if let Some(last) = (cursor..window_end)
                .rev()
                .find(|&i| is_sentence_end(tokens[i]))
            {
                take = last - cursor + 1;
            }
        }

        let decoded: String = tokens[cursor..cursor + take].concat();
        let flat = decoded.replace(['\n', '\r'], " ");
        let piece = flat.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        cursor += take;
    }

    chunks
}
