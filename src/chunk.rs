//! Deterministic fixed-size text chunker.
//!
//! Splits README text into overlapping character windows and pairs them
//! with the repository description (its own single chunk). The same input
//! always yields the same chunks in the same order — chunk identity is
//! `(repo_id, kind, index)` and no randomness is involved, so re-deriving
//! chunks for staleness checks is cheap and exact.

use tracing::warn;

use crate::config::ChunkingConfig;
use crate::models::{ChunkKind, RepoRecord, TextChunk};

/// Split `text` into windows of at most `max_chars` characters, each
/// overlapping the previous by `overlap` characters. Window boundaries
/// prefer whitespace near the cut so words are not bisected mid-chunk.
pub fn split_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    // overlap < max_chars is enforced at config validation
    let step = max_chars.saturating_sub(overlap).max(1);
    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + max_chars).min(chars.len());

        // Pull the cut back to the last whitespace inside the window,
        // unless that would shrink the window below the overlap step.
        let end = if hard_end < chars.len() {
            match chars[start..hard_end].iter().rposition(|c| c.is_whitespace()) {
                Some(pos) if pos + 1 > step => start + pos + 1,
                _ => hard_end,
            }
        } else {
            hard_end
        };

        pieces.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    pieces
}

/// Derive every chunk for one repository.
///
/// A non-blank description contributes exactly one `Description` chunk;
/// a non-blank README contributes its `ReadmeSegment` windows. Blank
/// README content (after stripping whitespace) is skipped with a warning
/// and contributes zero chunks.
pub fn chunk_repo(
    record: &RepoRecord,
    readme_text: Option<&str>,
    config: &ChunkingConfig,
) -> Vec<TextChunk> {
    let mut chunks = Vec::new();

    if let Some(description) = record.description.as_deref() {
        if !description.trim().is_empty() {
            chunks.push(TextChunk {
                repo_id: record.id,
                chunk_index: 0,
                kind: ChunkKind::Description,
                text: description.to_string(),
            });
        }
    }

    if let Some(readme) = readme_text {
        if readme.trim().is_empty() {
            warn!(repo = %record.full_name, "skipping empty README");
        } else {
            for (i, piece) in split_text(readme, config.max_chars, config.overlap_chars)
                .into_iter()
                .enumerate()
            {
                chunks.push(TextChunk {
                    repo_id: record.id,
                    chunk_index: i as i64,
                    kind: ChunkKind::ReadmeSegment,
                    text: piece,
                });
            }
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, description: Option<&str>) -> RepoRecord {
        RepoRecord {
            id,
            full_name: format!("owner/repo{}", id),
            description: description.map(str::to_string),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            topics: Vec::new(),
        }
    }

    fn cfg(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
        }
    }

    #[test]
    fn short_text_single_piece() {
        let pieces = split_text("Hello, world!", 100, 20);
        assert_eq!(pieces, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn long_text_overlapping_windows() {
        let text = "word ".repeat(100); // 500 chars
        let pieces = split_text(&text, 120, 30);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.chars().count() <= 120);
        }
        // Each window starts with the 30-char tail of its predecessor
        for pair in pieces.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let tail: String = prev[prev.len() - 30..].iter().collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn split_is_deterministic() {
        let text = "alpha beta gamma delta ".repeat(40);
        let a = split_text(&text, 100, 25);
        let b = split_text(&text, 100, 25);
        assert_eq!(a, b);
    }

    #[test]
    fn split_covers_tail() {
        let text = "x".repeat(1000);
        let pieces = split_text(&text, 300, 50);
        let last = pieces.last().unwrap();
        assert!(text.ends_with(last.as_str()));
    }

    #[test]
    fn description_only_yields_one_chunk() {
        let chunks = chunk_repo(&record(1, Some("A CLI tool")), None, &cfg(100, 20));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Description);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "A CLI tool");
    }

    #[test]
    fn blank_description_yields_nothing() {
        assert!(chunk_repo(&record(1, Some("   ")), None, &cfg(100, 20)).is_empty());
        assert!(chunk_repo(&record(1, None), None, &cfg(100, 20)).is_empty());
    }

    #[test]
    fn blank_readme_contributes_zero_chunks() {
        let chunks = chunk_repo(&record(1, Some("desc")), Some("  \n\n  "), &cfg(100, 20));
        assert_eq!(chunks.len(), 1); // description only
    }

    #[test]
    fn readme_segments_are_indexed_in_order() {
        let readme = "line of readme text ".repeat(30); // 600 chars
        let chunks = chunk_repo(&record(7, Some("desc")), Some(&readme), &cfg(150, 30));

        let segments: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::ReadmeSegment)
            .collect();
        assert!(segments.len() > 1);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.chunk_index, i as i64);
            assert_eq!(segment.repo_id, 7);
        }
    }

    #[test]
    fn chunk_derivation_is_reproducible() {
        let readme = "The quick brown fox jumps over the lazy dog. ".repeat(50);
        let rec = record(3, Some("A CLI tool"));
        let a = chunk_repo(&rec, Some(&readme), &cfg(200, 40));
        let b = chunk_repo(&rec, Some(&readme), &cfg(200, 40));
        assert_eq!(a, b);
    }
}
