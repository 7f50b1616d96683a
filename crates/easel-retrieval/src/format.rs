//! Context formatting for prompt injection.

use easel_core::{ContextEntry, ContextSource};

/// Render retrieved context as a numbered block for the system prompt.
///
/// Semantic entries carry a similarity annotation; gathered entries don't.
/// Order is preserved from the ranked merge.
pub fn format_context(entries: &[ContextEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        let origin = match entry.source {
            ContextSource::Document => match entry.page {
                Some(page) => format!("{} p.{}", entry.origin, page),
                None => entry.origin.clone(),
            },
            _ => format!("frame {}", entry.origin),
        };
        let score = match entry.similarity {
            Some(s) => format!(" [similarity {:.2}]", s),
            None => String::new(),
        };
        out.push_str(&format!(
            "{}. {} {}{}: {}\n",
            i + 1,
            entry.source.label(),
            origin,
            score,
            entry.text.trim()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        source: ContextSource,
        origin: &str,
        similarity: Option<f64>,
        page: Option<i64>,
        text: &str,
    ) -> ContextEntry {
        ContextEntry {
            source,
            origin: origin.to_string(),
            chunk_index: 0,
            text: text.to_string(),
            similarity,
            page,
        }
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_format_numbered_with_similarity() {
        let entries = vec![
            entry(
                ContextSource::Handwriting,
                "frame:abc",
                Some(0.92),
                None,
                "integral of x squared",
            ),
            entry(
                ContextSource::Document,
                "calc.pdf",
                Some(0.87),
                Some(3),
                "the power rule states",
            ),
        ];
        let block = format_context(&entries);
        assert_eq!(
            block,
            "1. Handwriting frame frame:abc [similarity 0.92]: integral of x squared\n\
             2. PDF calc.pdf p.3 [similarity 0.87]: the power rule states\n"
        );
    }

    #[test]
    fn test_format_gathered_omits_similarity() {
        let entries = vec![entry(
            ContextSource::TypedNote,
            "frame:x",
            None,
            None,
            "typed note text",
        )];
        let block = format_context(&entries);
        assert_eq!(block, "1. Note frame frame:x: typed note text\n");
    }
}
