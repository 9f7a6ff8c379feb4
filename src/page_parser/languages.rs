/// Site language labels (lower-cased) and the codes they normalize to.
pub const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("english", "en-us"),
    ("english (us)", "en-us"),
    ("español", "es-es"),
    ("español (españa)", "es-es"),
    ("español (latinoamérica)", "es-lat"),
    ("català", "es-ca"),
    ("galego", "es-gl"),
    ("brazilian", "pt-br"),
];

/// Looks up the normalized code for a language label as rendered on the site.
///
/// Returns `None` for labels not present in [`LANGUAGE_CODES`].
pub fn language_code(label: &str) -> Option<&'static str> {
    let label = label.trim().to_lowercase();
    LANGUAGE_CODES
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, code)| *code)
}
