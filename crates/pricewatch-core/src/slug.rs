/// Generates a URL-safe slug, folding Spanish accents to ASCII.
///
/// `"Electrónica"` becomes `"electronica"` and `"Teclado Mecánico"` becomes
/// `"teclado-mecanico"`. Runs of non-alphanumeric characters collapse to a
/// single `-`, with no leading or trailing dash.
#[must_use]
pub fn slugify(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            c if c.is_ascii_alphanumeric() => c,
            _ => '-',
        })
        .collect();

    folded
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
