//! Turning client-declared filenames into names that are safe to create
//! inside the shared directory.

/// Sequences replaced by `_`. `/` and `\` go first and `..` before the single
/// characters, so no replacement can produce a new forbidden sequence.
const FORBIDDEN: [&str; 10] = ["/", "\\", "..", ":", "*", "?", "\"", "<", ">", "|"];

/// Returns the final path component of a client-supplied filename, treating
/// both `/` and `\` as separators. Browsers on Windows may send full paths.
pub fn base_name(filename: &str) -> &str {
    filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
}

/// Replaces every path separator, parent reference and reserved character
/// with `_`. Pure and total.
pub fn sanitize_filename(filename: &str) -> String {
    FORBIDDEN
        .iter()
        .fold(filename.to_string(), |name, pattern| name.replace(pattern, "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_clean(name: &str) {
        for pattern in FORBIDDEN {
            assert!(
                !name.contains(pattern),
                "{name:?} still contains {pattern:?}"
            );
        }
    }

    #[test]
    fn base_name_drops_directory_prefixes() {
        assert_eq!(base_name("a.txt"), "a.txt");
        assert_eq!(base_name("dir/sub/a.txt"), "a.txt");
        assert_eq!(base_name("C:\\Users\\me\\a.txt"), "a.txt");
        assert_eq!(base_name("../../etc/passwd"), "passwd");
        assert_eq!(base_name("trailing/"), "");
    }

    #[test]
    fn replaces_reserved_characters() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("a:b*c?d\"e<f>g|h"), "a_b_c_d_e_f_g_h");
        assert_eq!(sanitize_filename("../secret"), "__secret");
        assert_eq!(sanitize_filename("..\\..\\x"), "____x");
        assert_eq!(sanitize_filename("..."), "_.");
    }

    #[test]
    fn output_never_contains_forbidden_sequences() {
        let inputs = [
            "",
            ".",
            "..",
            "...",
            "....",
            ".....",
            "./.",
            ".:.",
            ". .",
            "..//..\\\\..",
            "a..b..c",
            "名字..txt",
            "<<>>||**??::\"\"",
            "/etc/passwd",
            "\\\\server\\share\\..\\f",
            "..\u{0}..",
        ];
        for input in inputs {
            assert_clean(&sanitize_filename(input));
            assert_clean(&sanitize_filename(base_name(input)));
        }
    }

    #[test]
    fn sanitizing_is_deterministic() {
        let input = "we:ird/..name?.txt";
        assert_eq!(sanitize_filename(input), sanitize_filename(input));
    }
}
