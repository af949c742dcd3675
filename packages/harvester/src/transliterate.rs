//! Cyrillic to Latin transliteration.
//!
//! Character-wise and context free: every Cyrillic letter maps to a fixed
//! Latin string, everything else passes through unchanged.

/// Latin replacement for a lower-case Cyrillic letter.
fn lower(c: char) -> Option<&'static str> {
    let s = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' => "e",
        'ж' => "j",
        'з' => "z",
        'и' => "i",
        'й' | 'ы' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ю' => "iu",
        'я' => "ia",
        _ => return None,
    };
    Some(s)
}

/// Latin replacement for an upper-case Cyrillic letter.
fn upper(c: char) -> Option<&'static str> {
    let s = match c {
        'А' => "A",
        'Б' => "B",
        'В' => "V",
        'Г' => "G",
        'Д' => "D",
        'Е' | 'Ё' | 'Э' => "E",
        'Ж' => "J",
        'З' => "Z",
        'И' => "I",
        'Й' | 'Ы' => "Y",
        'К' => "K",
        'Л' => "L",
        'М' => "M",
        'Н' => "N",
        'О' => "O",
        'П' => "P",
        'Р' => "R",
        'С' => "S",
        'Т' => "T",
        'У' => "U",
        'Ф' => "F",
        'Х' => "H",
        'Ц' => "Ts",
        'Ч' => "Ch",
        'Ш' => "Sh",
        'Щ' => "Sch",
        'Ъ' | 'Ь' => "",
        'Ю' => "Iu",
        'Я' => "Ia",
        _ => return None,
    };
    Some(s)
}

/// Transliterate Cyrillic text to Latin.
///
/// # Examples
/// ```
/// use cashpoints_harvester::transliterate::transliterate;
///
/// assert_eq!(transliterate("Другие"), "Drugie");
/// assert_eq!(transliterate("Тверь"), "Tver");
/// assert_eq!(transliterate("Moscow 2"), "Moscow 2");
/// ```
#[must_use]
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match lower(c).or_else(|| upper(c)) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// Derive a Latin name from a site url code such as `"moskovskaya_oblast/pushkino"`.
///
/// Uses the last path segment, drops `~`, turns `_` into spaces and undoes
/// the site's `tss`/`ssh` spellings.
#[must_use]
pub fn name_from_url_code(code: &str) -> String {
    let segment = code.rsplit('/').next().unwrap_or(code);
    segment
        .replace('~', "")
        .replace('_', " ")
        .replace("tss", "z")
        .replace("ssh", "sh")
}
