// src/barcode.rs
pub fn normalize(raw: &str) -> String {
    // Scanners terminate frames with CR/LF or TAB and some prepend a BOM.
    // Codes can be alphanumeric (item codes, Code 128), so only control
    // characters are dropped from the inside.
    let s = raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}');

    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if !ch.is_control() && ch != '\u{FEFF}' {
            out.push(ch);
        }
    }
    out
}
