//! Upload safety helpers: filename sanitization and format sniffing.

/// Maximum stored filename length (filesystem-portable).
const MAX_FILENAME_LEN: usize = 255;

/// Sanitize a client-supplied filename for storage and display.
///
/// Strips path components, replaces control and shell-hostile characters,
/// and truncates overlong names while preserving the extension.
pub fn sanitize_filename(filename: &str) -> String {
    // Remove path components
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return "unnamed.pdf".to_string();
    }

    if sanitized.len() > MAX_FILENAME_LEN {
        if let Some(dot_pos) = sanitized.rfind('.') {
            let ext = &sanitized[dot_pos..];
            if ext.len() < MAX_FILENAME_LEN {
                let head = truncate_at_char_boundary(sanitized, MAX_FILENAME_LEN - ext.len());
                return format!("{}{}", head, ext);
            }
        }
        return truncate_at_char_boundary(sanitized, MAX_FILENAME_LEN).to_string();
    }

    sanitized.to_string()
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a
/// character.
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = 0;
    for (i, c) in s.char_indices() {
        if i + c.len_utf8() > max_bytes {
            break;
        }
        end = i + c.len_utf8();
    }
    &s[..end]
}

/// Whether the buffer starts with the `%PDF` magic bytes.
pub fn has_pdf_magic(data: &[u8]) -> bool {
    data.len() >= 4 && &data[0..4] == b"%PDF"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\x\\notes.pdf"), "notes.pdf");
    }

    #[test]
    fn test_sanitize_replaces_hostile_chars() {
        assert_eq!(sanitize_filename("a<b>c:d.pdf"), "a_b_c_d.pdf");
        assert_eq!(sanitize_filename("tab\there.pdf"), "tab_here.pdf");
    }

    #[test]
    fn test_sanitize_empty_gets_placeholder() {
        assert_eq!(sanitize_filename(""), "unnamed.pdf");
        assert_eq!(sanitize_filename("   "), "unnamed.pdf");
    }

    #[test]
    fn test_sanitize_truncates_preserving_extension() {
        let long = format!("{}.pdf", "a".repeat(300));
        let out = sanitize_filename(&long);
        assert_eq!(out.len(), MAX_FILENAME_LEN);
        assert!(out.ends_with(".pdf"));
    }

    #[test]
    fn test_sanitize_truncates_multibyte_on_char_boundary() {
        // 150 two-byte chars + extension lands the byte cut mid-character.
        let long = format!("{}.pdf", "é".repeat(150));
        let out = sanitize_filename(&long);
        assert!(out.len() <= MAX_FILENAME_LEN);
        assert!(out.ends_with(".pdf"));
        assert!(out.trim_end_matches(".pdf").chars().all(|c| c == 'é'));

        // No extension at all, same boundary hazard.
        let long = "界".repeat(200);
        let out = sanitize_filename(&long);
        assert!(out.len() <= MAX_FILENAME_LEN);
        assert!(out.chars().all(|c| c == '界'));
    }

    #[test]
    fn test_sanitize_passes_clean_names_through() {
        assert_eq!(sanitize_filename("lecture-notes_3.pdf"), "lecture-notes_3.pdf");
    }

    #[test]
    fn test_pdf_magic() {
        assert!(has_pdf_magic(b"%PDF-1.7 rest"));
        assert!(!has_pdf_magic(b"%PD"));
        assert!(!has_pdf_magic(b"PNG..."));
        assert!(!has_pdf_magic(b""));
    }
}
