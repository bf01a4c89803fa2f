//! Code-aware tokenizer: splits on non-alphanumeric boundaries, keeps
//! identifiers (including `_`) intact, and case-folds for matching while
//! tantivy's stored fields retain the original text for snippet extraction.

use tantivy::tokenizer::{BoxTokenStream, Token, TokenStream, Tokenizer};

pub const CODE_TOKENIZER_NAME: &str = "code";

#[derive(Clone, Default)]
pub struct CodeTokenizer;

pub struct CodeTokenStream {
    tokens: Vec<Token>,
    index: usize,
}

impl TokenStream for CodeTokenStream {
    fn advance(&mut self) -> bool {
        if self.index < self.tokens.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.index - 1]
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.tokens[self.index - 1]
    }
}

impl Tokenizer for CodeTokenizer {
    type TokenStream<'a> = BoxTokenStream<'a>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        let mut tokens = Vec::new();
        let mut start = None;
        let mut position = 0usize;

        let mut push_token = |s: usize, e: usize, text: &str, tokens: &mut Vec<Token>, position: &mut usize| {
            if e > s {
                tokens.push(Token {
                    offset_from: s,
                    offset_to: e,
                    position: *position,
                    text: text[s..e].to_lowercase(),
                    position_length: 1,
                });
                *position += 1;
            }
        };

        for (i, ch) in text.char_indices() {
            let is_word_char = ch.is_alphanumeric() || ch == '_';
            match (is_word_char, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    push_token(s, i, text, &mut tokens, &mut position);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            push_token(s, text.len(), text, &mut tokens, &mut position);
        }

        BoxTokenStream::new(CodeTokenStream { tokens, index: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(text: &str) -> Vec<String> {
        let mut tokenizer = CodeTokenizer;
        let mut stream = tokenizer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            out.push(stream.token().text.clone());
        }
        out
    }

    #[test]
    fn splits_on_non_alphanumeric_and_lowercases() {
        assert_eq!(
            tokenize("fn parse_json(Input: &str)"),
            vec!["fn", "parse_json", "input", "str"]
        );
    }

    #[test]
    fn preserves_underscored_identifiers_as_one_token() {
        assert_eq!(tokenize("max_retry_count"), vec!["max_retry_count"]);
    }
}
