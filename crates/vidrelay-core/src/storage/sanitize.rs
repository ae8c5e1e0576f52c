//! Filename sanitization for declared item filenames.

/// Sanitizes a declared filename so it stays inside the download directory.
///
/// - Replaces NUL, `/`, `\`, whitespace and control characters with `_`
/// - Trims leading/trailing dots and underscores (no `..`, no hidden files)
/// - Collapses consecutive underscores
/// - Limits length to 255 bytes (Linux NAME_MAX)
/// - Falls back to `video.bin` when nothing usable remains
pub fn sanitize_filename(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() || c.is_whitespace() {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');

    let limited = if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        &trimmed[..take]
    } else {
        trimmed
    };

    if limited.is_empty() {
        "video.bin".to_string()
    } else {
        limited.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_path_separators() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("a/b\\c.mp4"), "a_b_c.mp4");
    }

    #[test]
    fn trims_and_collapses() {
        assert_eq!(sanitize_filename("  ..  lecture 01.mp4  .."), "lecture_01.mp4");
        assert_eq!(sanitize_filename("file___name.mp4"), "file_name.mp4");
    }

    #[test]
    fn empty_falls_back() {
        assert_eq!(sanitize_filename(""), "video.bin");
        assert_eq!(sanitize_filename("..."), "video.bin");
    }

    #[test]
    fn long_names_are_cut_on_char_boundary() {
        let name = "é".repeat(200);
        let out = sanitize_filename(&name);
        assert!(out.len() <= 255);
        assert!(out.chars().all(|c| c == 'é'));
    }
}
