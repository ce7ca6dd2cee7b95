/// Canonical form used for fingerprinting: unified line endings, no trailing
/// whitespace on any line, no surrounding blank lines. Case and punctuation
/// are significant.
pub fn normalize(text: &str) -> String {
    let s = text.replace("\r\n", "\n").replace('\r', "\n");

    s.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
