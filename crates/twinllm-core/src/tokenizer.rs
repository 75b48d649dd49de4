use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use byteorder::{LittleEndian, ReadBytesExt};
use prost::Message;
use serde_json::json;
use tokenizers::{AddedToken, Tokenizer as HfTokenizer};
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};

/// Pre-tokenizer split pattern used by LLaMA-3 tiktoken vocabularies.
const LLAMA3_SPLIT_PATTERN: &str = r"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Upper bound for a single llama2.c piece; anything larger is not that format.
const LLAMA2C_MAX_PIECE_LEN: u32 = 1024;

/// On-disk tokenizer formats, in the order they are probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerFormat {
    /// Hugging Face `tokenizer.json`.
    HuggingFace,
    /// Tiktoken rank file: one `<base64 bytes> <rank>` pair per line.
    Tiktoken,
    /// SentencePiece `ModelProto` protobuf (LLaMA-2 style `tokenizer.model`).
    SentencePiece,
    /// llama2.c `tokenizer.bin`: `u32` max piece length followed by
    /// `(f32 score, i32 len, bytes)` records.
    Llama2c,
}

impl TokenizerFormat {
    pub const DETECTION_ORDER: [TokenizerFormat; 4] = [
        TokenizerFormat::HuggingFace,
        TokenizerFormat::Tiktoken,
        TokenizerFormat::SentencePiece,
        TokenizerFormat::Llama2c,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TokenizerFormat::HuggingFace => "HuggingFace",
            TokenizerFormat::Tiktoken => "Tiktoken",
            TokenizerFormat::SentencePiece => "SentencePiece",
            TokenizerFormat::Llama2c => "Llama2.c",
        }
    }

    /// Unigram vocabularies whose pieces carry `▁` for spaces.
    fn is_metaspace(self) -> bool {
        matches!(self, TokenizerFormat::SentencePiece | TokenizerFormat::Llama2c)
    }

    /// "HuggingFace, Tiktoken, SentencePiece or Llama2.c"
    fn detection_list() -> String {
        let names: Vec<&str> = Self::DETECTION_ORDER.iter().map(|f| f.name()).collect();
        match names.split_last() {
            Some((last, rest)) if !rest.is_empty() => format!("{} or {}", rest.join(", "), last),
            _ => names.join(""),
        }
    }
}

/// Thin wrapper around the Hugging Face `tokenizers` crate.
#[derive(Debug)]
pub struct Tokenizer {
    inner: HfTokenizer,
    format: TokenizerFormat,
    eos_token_id: Option<u32>,
}

impl Tokenizer {
    /// Load `path`, trying each [`TokenizerFormat`] in detection order.
    ///
    /// `special_tokens` are registered as unsplittable special tokens in
    /// whichever format matches.
    pub fn load(path: &Path, special_tokens: &[String]) -> CoreResult<Self> {
        for format in TokenizerFormat::DETECTION_ORDER {
            let attempt = match format {
                TokenizerFormat::HuggingFace => Self::from_hf_file(path, special_tokens),
                TokenizerFormat::Tiktoken => Self::from_tiktoken_file(path, special_tokens),
                TokenizerFormat::SentencePiece => Self::from_sentencepiece_file(path, special_tokens),
                TokenizerFormat::Llama2c => Self::from_llama2c_file(path, special_tokens),
            };
            match attempt {
                Ok(tokenizer) => {
                    info!(
                        path = %path.display(),
                        format = format.name(),
                        vocab_size = tokenizer.vocab_size(),
                        "Tokenizer loaded"
                    );
                    return Ok(tokenizer);
                }
                Err(e) => debug!(path = %path.display(), format = format.name(), error = %e, "Format did not match"),
            }
        }

        Err(CoreError::UnsupportedTokenizer {
            path: path.display().to_string(),
            tried: TokenizerFormat::detection_list(),
        })
    }

    /// Load a tokenizer from a `tokenizer.json` file.
    pub fn from_hf_file(path: &Path, special_tokens: &[String]) -> CoreResult<Self> {
        let inner = HfTokenizer::from_file(path).map_err(|e| CoreError::Tokenizer(e.to_string()))?;
        Ok(Self::finish(inner, TokenizerFormat::HuggingFace, special_tokens))
    }

    /// Load a tiktoken rank file and convert it to a byte-level BPE.
    pub fn from_tiktoken_file(path: &Path, special_tokens: &[String]) -> CoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| CoreError::Tokenizer("tiktoken file is not UTF-8 text".to_string()))?;
        let ranks = parse_tiktoken(&text)?;
        let json = tiktoken_tokenizer_json(&ranks, special_tokens);
        let inner: HfTokenizer = json
            .to_string()
            .parse()
            .map_err(|e: tokenizers::Error| CoreError::Tokenizer(format!("tiktoken conversion: {e}")))?;
        Ok(Self::finish(inner, TokenizerFormat::Tiktoken, special_tokens))
    }

    /// Load a SentencePiece `ModelProto` as a unigram model with byte fallback.
    pub fn from_sentencepiece_file(path: &Path, special_tokens: &[String]) -> CoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let pieces = parse_sentencepiece(&bytes)?;

        let unk_id = pieces.iter().position(|p| p.kind() == PIECE_TYPE_UNKNOWN);
        let vocab: Vec<(String, f64)> = pieces
            .into_iter()
            .map(|p| {
                let score = p.score.unwrap_or_default() as f64;
                (p.piece.unwrap_or_default(), score)
            })
            .collect();

        let inner = unigram_tokenizer(vocab, unk_id)?;
        Ok(Self::finish(inner, TokenizerFormat::SentencePiece, special_tokens))
    }

    /// Load a llama2.c `tokenizer.bin` as a SentencePiece-style unigram model.
    pub fn from_llama2c_file(path: &Path, special_tokens: &[String]) -> CoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let pieces = parse_llama2c(&bytes)?;

        // llama2.c exports pieces with `▁` already replaced by a space.
        let vocab: Vec<(String, f64)> = pieces
            .into_iter()
            .map(|(piece, score)| (piece.replace(' ', "\u{2581}"), score as f64))
            .collect();
        let unk_id = vocab.iter().position(|(p, _)| p == "<unk>");

        let inner = unigram_tokenizer(vocab, unk_id)?;
        Ok(Self::finish(inner, TokenizerFormat::Llama2c, special_tokens))
    }

    fn finish(mut inner: HfTokenizer, format: TokenizerFormat, special_tokens: &[String]) -> Self {
        let special: Vec<AddedToken> = special_tokens
            .iter()
            .map(|tok| AddedToken::from(tok.clone(), true))
            .collect();
        if !special.is_empty() {
            let added = inner.add_special_tokens(&special);
            debug!(requested = special.len(), added, "Registered special tokens");
        }

        // Native SentencePiece markers first: the LLaMA-3 control tokens are
        // registered on every vocabulary above.
        let eos_token_id = special_token_id(
            &inner,
            &["</s>", "\n</s>\n", "<|end_of_text|>", "<|endoftext|>", "<eos>"],
        );

        Self { inner, format, eos_token_id }
    }

    /// Encode a text string to a sequence of token ids.
    pub fn encode(&self, text: &str, add_special_tokens: bool) -> CoreResult<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, add_special_tokens)
            .map_err(|e| CoreError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode a sequence of token ids back to a string.
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> CoreResult<String> {
        self.inner
            .decode(ids, skip_special_tokens)
            .map_err(|e| CoreError::Tokenizer(e.to_string()))
    }

    /// Decode a single token id to its string representation.
    ///
    /// Unigram vocabularies bypass the HF decoder: `PrependScheme::First`
    /// treats every single-token call as the start of a sequence and would
    /// drop the leading `▁` of each word.
    pub fn decode_token(&self, id: u32) -> CoreResult<String> {
        if self.format.is_metaspace() {
            let raw = self
                .inner
                .id_to_token(id)
                .ok_or_else(|| CoreError::Tokenizer(format!("Unknown token id: {id}")))?;

            if raw.len() == 6 && raw.starts_with("<0x") && raw.ends_with('>') {
                if let Ok(b) = u8::from_str_radix(&raw[3..5], 16) {
                    return Ok(String::from_utf8_lossy(&[b]).to_string());
                }
            }
            return Ok(raw.replace('\u{2581}', " "));
        }

        self.decode(&[id], false)
    }

    pub fn format(&self) -> TokenizerFormat {
        self.format
    }

    pub fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }

    /// The size of the vocabulary including added tokens.
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    /// Look up the token id for an exact token string (e.g. `"<|eot_id|>"`).
    pub fn token_id(&self, text: &str) -> Option<u32> {
        self.inner.token_to_id(text)
    }
}

fn special_token_id(tokenizer: &HfTokenizer, candidates: &[&str]) -> Option<u32> {
    candidates.iter().find_map(|c| tokenizer.token_to_id(c))
}

/// Incremental detokenizer for streaming output.
///
/// Byte-level vocabularies can split one UTF-8 character across several
/// tokens, so text is only released once the decoded tail is a complete
/// character.
pub struct TokenStream<'a> {
    tokenizer: &'a Tokenizer,
    tokens: Vec<u32>,
    prev_index: usize,
    current_index: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        Self { tokenizer, tokens: Vec::new(), prev_index: 0, current_index: 0 }
    }

    /// Push one token; returns newly completed text, if any.
    pub fn next_token(&mut self, id: u32) -> CoreResult<Option<String>> {
        if self.tokenizer.format().is_metaspace() {
            return self.tokenizer.decode_token(id).map(Some);
        }

        let prev_text = self.tokenizer.decode(&self.tokens[self.prev_index..self.current_index], false)?;
        self.tokens.push(id);
        let text = self.tokenizer.decode(&self.tokens[self.prev_index..], false)?;

        if text.len() > prev_text.len() && !text.ends_with('\u{FFFD}') {
            if let Some(new_text) = text.get(prev_text.len()..) {
                let new_text = new_text.to_string();
                self.prev_index = self.current_index;
                self.current_index = self.tokens.len();
                return Ok(Some(new_text));
            }
        }
        Ok(None)
    }

    /// Decode whatever is still buffered at the end of generation.
    pub fn flush(&mut self) -> CoreResult<Option<String>> {
        if self.current_index >= self.tokens.len() {
            return Ok(None);
        }
        let prev_text = self.tokenizer.decode(&self.tokens[self.prev_index..self.current_index], false)?;
        let text = self.tokenizer.decode(&self.tokens[self.prev_index..], false)?;
        self.prev_index = self.tokens.len();
        self.current_index = self.tokens.len();
        Ok(text.get(prev_text.len()..).filter(|s| !s.is_empty()).map(str::to_string))
    }
}

/// Unigram model with the `▁` metaspace pre-tokenizer and byte-fallback decoding.
fn unigram_tokenizer(vocab: Vec<(String, f64)>, unk_id: Option<usize>) -> CoreResult<HfTokenizer> {
    use tokenizers::decoders::byte_fallback::ByteFallback;
    use tokenizers::decoders::metaspace::Metaspace as MetaspaceDec;
    use tokenizers::decoders::sequence::Sequence as SeqDec;
    use tokenizers::pre_tokenizers::metaspace::{Metaspace as MetaspacePre, PrependScheme};

    let unigram = tokenizers::models::unigram::Unigram::from(vocab, unk_id, true)
        .map_err(|e| CoreError::Tokenizer(format!("Unigram build error: {e}")))?;
    let mut inner = HfTokenizer::new(unigram);
    inner.with_pre_tokenizer(Some(MetaspacePre::new('\u{2581}', PrependScheme::First, false)));
    inner.with_decoder(Some(SeqDec::new(vec![
        tokenizers::DecoderWrapper::ByteFallback(ByteFallback::new()),
        tokenizers::DecoderWrapper::Metaspace(MetaspaceDec::new('\u{2581}', PrependScheme::First, false)),
    ])));
    Ok(inner)
}

// ─── Tiktoken ────────────────────────────────────────────────────────────────

fn parse_tiktoken(text: &str) -> CoreResult<Vec<(Vec<u8>, u32)>> {
    let mut ranks = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(encoded), Some(rank), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CoreError::Tokenizer(format!("tiktoken line {}: expected `<token> <rank>`", lineno + 1)));
        };
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CoreError::Tokenizer(format!("tiktoken line {}: {e}", lineno + 1)))?;
        let rank: u32 = rank
            .parse()
            .map_err(|e| CoreError::Tokenizer(format!("tiktoken line {}: bad rank: {e}", lineno + 1)))?;
        ranks.push((bytes, rank));
    }
    if ranks.is_empty() {
        return Err(CoreError::Tokenizer("tiktoken file has no entries".to_string()));
    }
    Ok(ranks)
}

/// Build an equivalent `tokenizer.json` document for a tiktoken vocabulary.
///
/// Merges are recovered from ranks: every split of a token into two
/// in-vocabulary halves becomes a merge, ordered by the rank of the merged
/// token and then by the ranks of its halves.
fn tiktoken_tokenizer_json(ranks: &[(Vec<u8>, u32)], special_tokens: &[String]) -> serde_json::Value {
    let byte_map = bytes_to_unicode();
    let to_unicode = |bytes: &[u8]| -> String { bytes.iter().map(|b| byte_map[*b as usize]).collect() };

    let rank_of: HashMap<&[u8], u32> = ranks.iter().map(|(b, r)| (b.as_slice(), *r)).collect();

    let mut vocab = serde_json::Map::with_capacity(ranks.len());
    let mut candidates: Vec<(u32, u32, u32, &[u8], &[u8])> = Vec::new();
    for (bytes, rank) in ranks {
        vocab.insert(to_unicode(bytes), json!(rank));
        for split in 1..bytes.len() {
            let (left, right) = bytes.split_at(split);
            if let (Some(&l), Some(&r)) = (rank_of.get(left), rank_of.get(right)) {
                candidates.push((*rank, l, r, left, right));
            }
        }
    }
    candidates.sort_unstable_by_key(|&(rank, l, r, _, _)| (rank, l, r));
    let merges: Vec<String> = candidates
        .iter()
        .map(|(_, _, _, left, right)| format!("{} {}", to_unicode(left), to_unicode(right)))
        .collect();

    let first_special = ranks.iter().map(|(_, r)| r + 1).max().unwrap_or(0);
    let added_tokens: Vec<serde_json::Value> = special_tokens
        .iter()
        .enumerate()
        .map(|(i, content)| {
            json!({
                "id": first_special + i as u32,
                "content": content,
                "single_word": false,
                "lstrip": false,
                "rstrip": false,
                "normalized": false,
                "special": true,
            })
        })
        .collect();

    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": null,
        "pre_tokenizer": {
            "type": "Sequence",
            "pretokenizers": [
                {
                    "type": "Split",
                    "pattern": { "Regex": LLAMA3_SPLIT_PATTERN },
                    "behavior": "Isolated",
                    "invert": false,
                },
                {
                    "type": "ByteLevel",
                    "add_prefix_space": false,
                    "trim_offsets": true,
                    "use_regex": false,
                },
            ],
        },
        "post_processor": null,
        "decoder": {
            "type": "ByteLevel",
            "add_prefix_space": true,
            "trim_offsets": true,
            "use_regex": true,
        },
        "model": {
            "type": "BPE",
            "dropout": null,
            "unk_token": null,
            "continuing_subword_prefix": null,
            "end_of_word_suffix": null,
            "fuse_unk": false,
            "byte_fallback": false,
            "ignore_merges": true,
            "vocab": vocab,
            "merges": merges,
        },
    })
}

/// GPT-2 reversible byte → printable-char table used by byte-level BPE.
fn bytes_to_unicode() -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut shifted = 0u32;
    for b in 0..=255u8 {
        let printable = matches!(b, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF);
        table[b as usize] = if printable {
            char::from(b)
        } else {
            let c = char::from_u32(256 + shifted).unwrap_or('\u{FFFD}');
            shifted += 1;
            c
        };
    }
    table
}

// ─── SentencePiece ───────────────────────────────────────────────────────────

const PIECE_TYPE_NORMAL: i32 = 1;
const PIECE_TYPE_UNKNOWN: i32 = 2;

/// The subset of `sentencepiece_model.proto` needed to rebuild the vocabulary.
/// Trainer and normalizer specs are skipped as unknown fields.
#[derive(Clone, PartialEq, Message)]
struct ModelProto {
    #[prost(message, repeated, tag = "1")]
    pieces: Vec<SentencePieceProto>,
}

#[derive(Clone, PartialEq, Message)]
struct SentencePieceProto {
    #[prost(string, optional, tag = "1")]
    piece: Option<String>,
    #[prost(float, optional, tag = "2")]
    score: Option<f32>,
    #[prost(int32, optional, tag = "3")]
    piece_type: Option<i32>,
}

impl SentencePieceProto {
    fn kind(&self) -> i32 {
        self.piece_type.unwrap_or(PIECE_TYPE_NORMAL)
    }
}

fn parse_sentencepiece(bytes: &[u8]) -> CoreResult<Vec<SentencePieceProto>> {
    let model = ModelProto::decode(bytes)
        .map_err(|e| CoreError::Tokenizer(format!("SentencePiece model: {e}")))?;
    if model.pieces.is_empty() {
        return Err(CoreError::Tokenizer("SentencePiece model has no pieces".to_string()));
    }
    if model.pieces.iter().any(|p| p.piece.as_deref().map_or(true, str::is_empty)) {
        return Err(CoreError::Tokenizer("SentencePiece model has an empty piece".to_string()));
    }
    Ok(model.pieces)
}

// ─── llama2.c ────────────────────────────────────────────────────────────────

fn parse_llama2c(bytes: &[u8]) -> CoreResult<Vec<(String, f32)>> {
    let malformed = |reason: &str| CoreError::Tokenizer(format!("llama2.c tokenizer: {reason}"));

    let mut cursor = Cursor::new(bytes);
    let max_token_length = cursor.read_u32::<LittleEndian>()?;
    if max_token_length == 0 || max_token_length > LLAMA2C_MAX_PIECE_LEN {
        return Err(malformed("implausible max token length"));
    }

    let mut pieces = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        let score = cursor.read_f32::<LittleEndian>()?;
        let len = cursor.read_i32::<LittleEndian>()?;
        if len < 0 || len as u32 > max_token_length {
            return Err(malformed("piece length out of range"));
        }
        let mut buf = vec![0u8; len as usize];
        cursor.read_exact(&mut buf)?;
        let piece = String::from_utf8(buf).map_err(|_| malformed("piece is not UTF-8"))?;
        pieces.push((piece, score));
    }

    if pieces.is_empty() {
        return Err(malformed("no pieces"));
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use byteorder::WriteBytesExt;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Byte-level tiktoken vocabulary: all 256 single bytes plus a few merges.
    fn tiktoken_fixture() -> String {
        let mut lines = Vec::new();
        for b in 0..=255u8 {
            lines.push(format!("{} {}", BASE64.encode([b]), b));
        }
        for (i, word) in ["he", "ll", "hell", "hello"].iter().enumerate() {
            lines.push(format!("{} {}", BASE64.encode(word.as_bytes()), 256 + i));
        }
        lines.join("\n")
    }

    fn llama2c_fixture() -> Vec<u8> {
        let pieces: [(&str, f32); 6] = [
            ("<unk>", 0.0),
            ("\n<s>\n", 0.0),
            ("\n</s>\n", 0.0),
            (" hello", -1.0),
            (" world", -2.0),
            ("h", -5.0),
        ];
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(16).unwrap();
        for (piece, score) in pieces {
            out.write_f32::<LittleEndian>(score).unwrap();
            out.write_i32::<LittleEndian>(piece.len() as i32).unwrap();
            out.write_all(piece.as_bytes()).unwrap();
        }
        out
    }

    fn sentencepiece_fixture() -> Vec<u8> {
        let pieces: [(&str, f32, i32); 7] = [
            ("<unk>", 0.0, PIECE_TYPE_UNKNOWN),
            ("<s>", 0.0, 3),
            ("</s>", 0.0, 3),
            ("\u{2581}hello", -1.0, PIECE_TYPE_NORMAL),
            ("\u{2581}world", -2.0, PIECE_TYPE_NORMAL),
            ("h", -5.0, PIECE_TYPE_NORMAL),
            ("<0x41>", 0.0, 6),
        ];
        ModelProto {
            pieces: pieces
                .iter()
                .map(|(piece, score, kind)| SentencePieceProto {
                    piece: Some(piece.to_string()),
                    score: Some(*score),
                    piece_type: Some(*kind),
                })
                .collect(),
        }
        .encode_to_vec()
    }

    fn specials() -> Vec<String> {
        crate::special_tokens::default_special_tokens()
    }

    #[test]
    fn detection_list_reads_naturally() {
        assert_eq!(
            TokenizerFormat::detection_list(),
            "HuggingFace, Tiktoken, SentencePiece or Llama2.c"
        );
    }

    #[test]
    fn bytes_to_unicode_is_bijective() {
        let table = bytes_to_unicode();
        let unique: std::collections::HashSet<char> = table.iter().copied().collect();
        assert_eq!(unique.len(), 256);
        assert_eq!(table[b' ' as usize], '\u{0120}');
        assert_eq!(table[b'a' as usize], 'a');
    }

    #[test]
    fn tiktoken_parse_rejects_json() {
        assert!(parse_tiktoken("{\n  \"version\": \"1.0\"\n}").is_err());
    }

    #[test]
    fn llama2c_parse_rejects_text() {
        assert!(parse_llama2c(b"not a tokenizer at all").is_err());
    }

    #[test]
    fn loads_tiktoken_and_roundtrips_text() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tokenizer.model", tiktoken_fixture().as_bytes());

        let tok = Tokenizer::load(&path, &specials()).unwrap();
        assert_eq!(tok.format(), TokenizerFormat::Tiktoken);

        let ids = tok.encode("hello", false).unwrap();
        assert_eq!(ids, vec![259]);
        assert_eq!(tok.decode(&ids, false).unwrap(), "hello");
    }

    #[test]
    fn tiktoken_special_tokens_follow_base_vocab() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tokenizer.model", tiktoken_fixture().as_bytes());

        let tok = Tokenizer::load(&path, &specials()).unwrap();
        assert_eq!(tok.token_id("<|begin_of_text|>"), Some(260));
        assert_eq!(tok.token_id("<|eot_id|>"), Some(269));
        assert_eq!(tok.eos_token_id(), Some(261));
        assert_eq!(tok.vocab_size(), 260 + 256);
    }

    #[test]
    fn special_tokens_encode_as_single_ids() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tokenizer.model", tiktoken_fixture().as_bytes());

        let tok = Tokenizer::load(&path, &specials()).unwrap();
        let ids = tok.encode("<|eot_id|>hello", false).unwrap();
        assert_eq!(ids, vec![269, 259]);
    }

    #[test]
    fn loads_llama2c_binary() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tokenizer.bin", &llama2c_fixture());

        let tok = Tokenizer::load(&path, &specials()).unwrap();
        assert_eq!(tok.format(), TokenizerFormat::Llama2c);
        assert_eq!(tok.eos_token_id(), Some(2));
        let hello = tok.token_id("\u{2581}hello").unwrap();
        assert_eq!(tok.decode_token(hello).unwrap(), " hello");
    }

    #[test]
    fn sentencepiece_parse_rejects_llama2c() {
        assert!(parse_sentencepiece(&llama2c_fixture()).is_err());
    }

    #[test]
    fn loads_sentencepiece_model() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tokenizer.model", &sentencepiece_fixture());

        let tok = Tokenizer::load(&path, &specials()).unwrap();
        assert_eq!(tok.format(), TokenizerFormat::SentencePiece);
        assert_eq!(tok.eos_token_id(), Some(2));
        assert_eq!(tok.token_id("<|eot_id|>"), Some(7 + 9));

        let ids = tok.encode("hello world", false).unwrap();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(tok.decode_token(3).unwrap(), " hello");
        assert_eq!(tok.decode_token(6).unwrap(), "A");
    }

    #[test]
    fn unknown_format_lists_everything_tried() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "garbage.bin", b"\xff\xff\xff\xff\x00");

        let err = Tokenizer::load(&path, &specials()).unwrap_err();
        match err {
            CoreError::UnsupportedTokenizer { path: p, tried } => {
                assert!(p.ends_with("garbage.bin"));
                assert_eq!(tried, "HuggingFace, Tiktoken, SentencePiece or Llama2.c");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_unsupported() {
        let err = Tokenizer::load(Path::new("/definitely/not/here.model"), &specials()).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedTokenizer { .. }));
    }

    #[test]
    fn token_stream_reassembles_text() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tokenizer.model", tiktoken_fixture().as_bytes());
        let tok = Tokenizer::load(&path, &specials()).unwrap();

        let ids = tok.encode("hello hello", false).unwrap();
        let mut stream = TokenStream::new(&tok);
        let mut out = String::new();
        for id in ids {
            if let Some(text) = stream.next_token(id).unwrap() {
                out.push_str(&text);
            }
        }
        if let Some(rest) = stream.flush().unwrap() {
            out.push_str(&rest);
        }
        assert_eq!(out, "hello hello");
    }

    #[test]
    fn token_stream_holds_partial_utf8() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tokenizer.model", tiktoken_fixture().as_bytes());
        let tok = Tokenizer::load(&path, &specials()).unwrap();

        // "é" is two bytes and therefore two tokens in a bytes-only vocabulary.
        let mut stream = TokenStream::new(&tok);
        assert_eq!(stream.next_token(0xC3).unwrap(), None);
        assert_eq!(stream.next_token(0xA9).unwrap().as_deref(), Some("é"));
    }
}
