//! HTML character entity decoding for text fields coming out of the API.
//!
//! Only what the API is known to emit: the common named entities plus
//! decimal and hex numeric references. Unknown entities are left as-is.

/// Named entity lookup (without `&` and `;`).
fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "laquo" => '«',
        "raquo" => '»',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "bdquo" => '„',
        "ldquo" => '“',
        "rdquo" => '”',
        "lsquo" => '‘',
        "rsquo" => '’',
        "deg" => '°',
        "numero" => '№',
        "copy" => '©',
        "middot" => '·',
        _ => return None,
    };
    Some(c)
}

/// Decode a numeric reference body such as `#1078` or `#x436`.
fn numeric_entity(body: &str) -> Option<char> {
    let digits = body.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

/// Longest entity body we try to interpret, e.g. `#x10FFFF` or `numero`.
const MAX_ENTITY_LEN: usize = 8;

/// Decode HTML character entities.
///
/// `&nbsp;` becomes a regular space so later trimming treats it as whitespace.
///
/// # Examples
/// ```
/// use cashpoints_harvester::html::decode_entities;
///
/// assert_eq!(decode_entities("Пн&ndash;Пт 9:00&nbsp;-&nbsp;18:00"), "Пн–Пт 9:00 - 18:00");
/// assert_eq!(decode_entities("&#1078;&#x436;"), "жж");
/// assert_eq!(decode_entities("AT&T &bogus;"), "AT&T &bogus;");
/// ```
#[must_use]
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        let decoded = after
            .find(';')
            .filter(|&semi| semi > 0 && semi <= MAX_ENTITY_LEN)
            .and_then(|semi| {
                let body = &after[..semi];
                let c = if body.starts_with('#') {
                    numeric_entity(body)
                } else {
                    named_entity(body)
                };
                c.map(|c| (c, semi))
            });

        match decoded {
            Some((c, semi)) => {
                out.push(if c == '\u{a0}' { ' ' } else { c });
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
