use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue};
use serde_json::Value;

use crate::Identifier;
use crate::config::Settings;
use crate::error::LookupError;
use crate::source::{Filters, RecordSource, Row, UNKNOWN_CATEGORY};

static DATA_PAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div[^>]+data-page=(?:"([^"]*)"|'([^']*)')"#)
        .expect("invalid data-page regex")
});

static CLASS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[class=(\d+)\]").expect("invalid class marker regex"));

const CLASSES: [&str; 13] = [
    "Warrior",
    "Paladin",
    "Hunter",
    "Rogue",
    "Priest",
    "Death Knight",
    "Shaman",
    "Mage",
    "Warlock",
    "Monk",
    "Druid",
    "Demon Hunter",
    "Evoker",
];

/// [`RecordSource`] backed by the wago.tools DB2 browser, the wago.tools
/// file search and wowhead spell pages.
#[derive(Debug, Clone)]
pub struct WagoSource {
    client: Client,
    db2_base: String,
    files_base: String,
    classify_base: String,
}

impl WagoSource {
    pub fn new(settings: &Settings) -> Result<Self, LookupError> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .user_agent(concat!("spellfiles/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            db2_base: settings.db2_base.trim_end_matches('/').to_string(),
            files_base: settings.files_base.trim_end_matches('/').to_string(),
            classify_base: settings.classify_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, LookupError> {
        tracing::debug!(url, ?query, "GET");

        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl RecordSource for WagoSource {
    async fn lookup(&self, table: &str, filters: &Filters) -> Result<Vec<Row>, LookupError> {
        let url = format!("{}/{}", self.db2_base, table);
        let query: Vec<_> = filters
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();

        let body = self.get(&url, &query).await?;
        Ok(rows_at(&body, &["props", "data", "data"])?)
    }

    async fn file_search(&self, id: Identifier) -> Result<Vec<String>, LookupError> {
        let id = id.to_string();
        let body = self.get(&self.files_base, &[("search", &id)]).await?;

        let names = rows_at(&body, &["props", "files", "data"])?
            .iter()
            .filter_map(|row| row.text("filename").map(str::to_string))
            .collect();

        Ok(names)
    }

    async fn classify(&self, id: Identifier) -> Result<String, LookupError> {
        let url = format!("{}={}", self.classify_base, id);
        let body = self.get(&url, &[]).await?;
        Ok(class_from_page(&body).to_string())
    }
}

/// Extracts the JSON embedded in the `data-page` attribute of an Inertia
/// page and returns the row objects found under `path`.
///
/// A page without the attribute, or a payload without rows at `path`, yields
/// no rows.
pub(crate) fn rows_at(body: &str, path: &[&str]) -> Result<Vec<Row>, serde_json::Error> {
    let Some(captures) = DATA_PAGE.captures(body) else {
        return Ok(Vec::new());
    };
    let Some(raw) = captures.get(1).or_else(|| captures.get(2)) else {
        return Ok(Vec::new());
    };

    let payload: Value = serde_json::from_str(&unescape(raw.as_str()))?;

    let rows = path
        .iter()
        .try_fold(&payload, |value, key| value.get(key))
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.as_object().cloned().map(Row))
                .collect()
        })
        .unwrap_or_default();

    Ok(rows)
}

pub(crate) fn class_from_page(body: &str) -> &'static str {
    CLASS_MARKER
        .captures(body)
        .and_then(|captures| captures[1].parse::<usize>().ok())
        .and_then(|class| class.checked_sub(1))
        .and_then(|index| CLASSES.get(index).copied())
        .unwrap_or(UNKNOWN_CATEGORY)
}

/// Named references decoded with a terminating `;`.
const NAMED: [(&str, char); 19] = [
    ("quot", '"'),
    ("apos", '\''),
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("nbsp", '\u{a0}'),
    ("copy", '©'),
    ("reg", '®'),
    ("times", '×'),
    ("middot", '·'),
    ("laquo", '«'),
    ("raquo", '»'),
    ("lsquo", '‘'),
    ("rsquo", '’'),
    ("ldquo", '“'),
    ("rdquo", '”'),
    ("ndash", '\u{2013}'),
    ("mdash", '\u{2014}'),
    ("hellip", '…'),
];

/// Legacy references browsers also accept without the `;`.
const LEGACY: [(&str, char); 4] = [("amp", '&'), ("lt", '<'), ("gt", '>'), ("quot", '"')];

/// Decodes the HTML character references that can appear inside an
/// attribute value.
///
/// Handles numeric references (decimal and hex, with or without `;`), the
/// named references in [`NAMED`] and the semicolon-less forms in [`LEGACY`].
/// Numeric references outside Unicode, surrogates and `&#0;` become U+FFFD.
/// Anything else is kept as written.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start + 1..];

        match decode_reference(rest) {
            Some((c, used)) => {
                out.push(c);
                rest = &rest[used..];
            }
            None => out.push('&'),
        }
    }

    out.push_str(rest);
    out
}

/// Decodes the reference at the start of `text`, which follows an `&`.
/// Returns the character and the number of bytes consumed.
fn decode_reference(text: &str) -> Option<(char, usize)> {
    if let Some(numeric) = text.strip_prefix('#') {
        let (digits, radix, prefix) = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16, 2),
            None => (numeric, 10, 1),
        };

        let len = digits
            .find(|c: char| !c.is_digit(radix))
            .unwrap_or(digits.len());
        if len == 0 {
            return None;
        }

        let c = u32::from_str_radix(&digits[..len], radix)
            .ok()
            .filter(|&code| code != 0)
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        let semicolon = usize::from(digits[len..].starts_with(';'));

        return Some((c, prefix + len + semicolon));
    }

    let len = text
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(text.len());
    let name = &text[..len];

    if text[len..].starts_with(';')
        && let Some(&(_, c)) = NAMED.iter().find(|(known, _)| *known == name)
    {
        return Some((c, len + 1));
    }

    LEGACY
        .iter()
        .find(|(known, _)| name.starts_with(known))
        .map(|&(known, c)| (c, known.len()))
}
