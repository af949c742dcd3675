//! Free-text normalization of cash point annotations.
//!
//! The `additional` field of a cash point is a vendor free-text blob. This
//! module derives currency and cash-deposit flags from it, detects textual
//! access restrictions and strips known boilerplate. Matching is verbatim
//! substring matching on fixed phrase lists, including the historical
//! misspellings that occur in the source data.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::html::decode_entities;
use crate::types::{CashPoint, EnrichedCashPoint};

/// Lower-cased marker of a currency statement ("валюта:").
pub const CURRENCY_MARKER: &str = "валюта:";

/// Ruble token inside a currency statement.
pub const RUB_TOKEN: &str = "рубл";

/// Dollar token inside a currency statement.
pub const USD_TOKEN: &str = "доллар";

/// Euro token inside a currency statement.
pub const EUR_TOKEN: &str = "евро";

/// Marker of a cash deposit mention, used to build the cash-in index.
pub const CASH_IN_MARKER: &str = "приема";

/// Cleaned annotations shorter than this collapse to empty.
pub const MIN_ANNOTATION_CHARS: usize = 3;

/// Boilerplate removed from annotations. Longer variants come before their
/// prefixes so the whole phrase goes in one piece.
pub const NOISE_PHRASES: &[&str] = &[
    "Банкомат с функцией приема наличных",
    "Банкомат с функцией приёма наличных",
    "банкомат с функцией приема наличных",
    "С функцией приема наличных",
    "С функцией приёма наличных",
    "с функцией приема наличных",
    "с функцией приема наличныx",
    "Функция приема наличных",
    "функция приема наличных",
    "функция приема наличнях",
    "Прием наличных",
    "прием наличных",
    "Валюта: рубли, доллары, евро",
    "Валюта: рубли, доллары США, евро",
    "Валюта: рубли, доллары",
    "Валюта: рубли, евро",
    "Валюта: рубли",
    "Валюта: доллары, евро",
    "Валюта: доллары",
    "Валюта: евро",
    "валюта: рубли, доллары, евро",
    "валюта: рубли, доллары США, евро",
    "валюта: рубли, доллары",
    "валюта: рубли, евро",
    "валюта: рубли",
    "валюта: доллары, евро",
    "валюта: доллары",
    "валюта: евро",
    "Валюта:",
    "валюта:",
    "125009, г. Москва, ул. Тверская, д. 7",
    "125009, г.Москва, ул.Тверская, д.7",
    "<br />",
    "<br/>",
    "<br>",
    "<BR>",
];

/// Phrasings that mean the point is not freely accessible.
pub const ACCESS_RESTRICTION_PHRASES: &[&str] = &[
    "Вход по пропускам на территорию",
    "Вход по пропускам",
    "вход по пропускам",
    "Вход по пропускм",
    "Вход по пропуску",
    "вход по пропуску",
    "Проход по пропускам",
    "проход по пропускам",
    "Ограниченный доступ",
    "ограниченный доступ",
    "Ограниченый доступ",
    "Доступ ограничен",
    "доступ ограничен",
    "Доступ только для сотрудников",
    "доступ только для сотрудников",
    "Только для сотрудников",
    "только для сотрудников",
    "Для сотрудников организации",
    "для сотрудников организации",
];

/// Leading punctuation and whitespace.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LEADING_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\p{P}]+").expect("valid regex"));

/// Trailing punctuation and whitespace.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TRAILING_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\p{P}]+$").expect("valid regex"));

/// Runs of whitespace left behind by phrase removal.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// Currencies a point accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currencies {
    pub rub: bool,
    pub usd: bool,
    pub eur: bool,
}

impl Default for Currencies {
    fn default() -> Self {
        Self {
            rub: true,
            usd: false,
            eur: false,
        }
    }
}

/// Derive accepted currencies from an annotation.
///
/// Without a currency statement the point is ruble only. With one, each
/// currency is accepted exactly when its token appears.
#[must_use]
pub fn detect_currencies(annotation: &str) -> Currencies {
    let lower = annotation.to_lowercase();
    if !lower.contains(CURRENCY_MARKER) {
        return Currencies::default();
    }
    Currencies {
        rub: lower.contains(RUB_TOKEN),
        usd: lower.contains(USD_TOKEN),
        eur: lower.contains(EUR_TOKEN),
    }
}

/// Remove every occurrence of every phrase. Returns true if anything changed.
fn strip_phrases(text: &mut String, phrases: &[&str]) -> bool {
    let before = text.len();
    for phrase in phrases {
        if text.contains(phrase) {
            *text = text.replace(phrase, "");
        }
    }
    text.len() != before
}

/// Collapse whitespace runs to one space. Returns true if anything changed.
fn collapse_whitespace(text: &mut String) -> bool {
    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
    if collapsed.len() == text.len() {
        return false;
    }
    *text = collapsed.into_owned();
    true
}

/// Trim punctuation/whitespace at both ends and drop near-empty leftovers.
#[must_use]
pub fn trim_annotation(text: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
    let head = LEADING_NOISE.replace(&collapsed, "");
    let trimmed = TRAILING_NOISE.replace(&head, "");
    if trimmed.chars().count() < MIN_ANNOTATION_CHARS {
        String::new()
    } else {
        trimmed.into_owned()
    }
}

/// Result of normalizing one annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub currencies: Currencies,
    pub restricted_access: bool,
    pub additional: String,
}

/// Normalize a raw annotation.
///
/// Entities are decoded and the text NFC-composed before any matching, so
/// decomposed `й`/`ё` still hit the phrase lists.
///
/// # Examples
/// ```
/// use cashpoints_harvester::normalize::normalize_annotation;
///
/// let n = normalize_annotation("Вход по пропускам, валюта: рубли, доллары");
/// assert!(n.currencies.rub && n.currencies.usd && !n.currencies.eur);
/// assert!(n.restricted_access);
/// assert_eq!(n.additional, "");
/// ```
#[must_use]
pub fn normalize_annotation(raw: &str) -> Normalized {
    let mut text: String = decode_entities(raw).nfc().collect();
    let currencies = detect_currencies(&text);

    // Removal can splice the surrounding text into a listed phrase again.
    let mut restricted_access = false;
    loop {
        let noise = strip_phrases(&mut text, NOISE_PHRASES);
        let access = strip_phrases(&mut text, ACCESS_RESTRICTION_PHRASES);
        let spaces = collapse_whitespace(&mut text);
        restricted_access |= access;
        if !(noise || access || spaces) {
            break;
        }
    }

    Normalized {
        currencies,
        restricted_access,
        additional: trim_annotation(&text),
    }
}

/// Ids of points whose raw annotation mentions cash deposits.
#[must_use]
pub fn cash_in_index<'a>(points: impl IntoIterator<Item = &'a CashPoint>) -> HashSet<i64> {
    points
        .into_iter()
        .filter(|cp| cp.additional.to_lowercase().contains(CASH_IN_MARKER))
        .map(|cp| cp.id)
        .collect()
}

/// Produce the enriched record for one point.
///
/// Schedules are entity-decoded too. Textual evidence of restricted access
/// forces `free_access` off whatever the source said.
#[must_use]
pub fn enrich(mut point: CashPoint, cash_in: bool) -> EnrichedCashPoint {
    let normalized = normalize_annotation(&point.additional);

    point.schedule_general = decode_entities(&point.schedule_general);
    point.schedule_private = decode_entities(&point.schedule_private);
    point.schedule_vip = decode_entities(&point.schedule_vip);
    point.additional = normalized.additional;
    if normalized.restricted_access {
        point.free_access = false;
    }

    EnrichedCashPoint {
        point,
        rub: normalized.currencies.rub,
        usd: normalized.currencies.usd,
        eur: normalized.currencies.eur,
        cash_in,
    }
}
