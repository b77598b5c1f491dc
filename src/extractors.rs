use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::{
    error::ExtractionError,
    features::{HtmlFeatures, TextFeatures, UrlFeatures},
};

const SUSPICIOUS_TLDS: &[&str] = &["xyz", "tk", "ml", "ga", "cf", "gq"];

const URL_KEYWORDS: &[&str] = &["login", "signin", "verify", "secure", "account", "update", "confirm"];

const SECURITY_KEYWORDS: &[&str] = &["verify", "confirm", "update", "login", "sign in", "validate", "secure"];

const URGENCY_KEYWORDS: &[&str] = &["urgent", "immediately", "alert", "attention", "important", "action required"];

const FINANCIAL_KEYWORDS: &[&str] = &[
    "account",
    "credit card",
    "bank",
    "paypal",
    "transaction",
    "suspended",
    "limited",
];

const SUSPICIOUS_PHRASES: &[&str] = &[
    "verify your account",
    "confirm your identity",
    "account has been suspended",
    "unusual activity",
    "security alert",
];

static IPV4_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("valid IPv4 pattern"));

static URL_SPECIAL_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9./:?&=-]").expect("valid special char pattern"));

static HIDDEN_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"display:\s*none").expect("valid hidden style pattern"));

/// Lexical features of a URL. No I/O.
///
/// Input without a scheme (`paypal-login.tk/verify`) is still scored: host
/// and scheme stay empty and the whole input is treated as the path. Only
/// input that names a scheme but cannot be parsed is an error.
pub fn extract_url_features(raw: &str) -> Result<UrlFeatures, ExtractionError> {
    let (scheme, host, path) = match Url::parse(raw) {
        Ok(parsed) => (
            parsed.scheme().to_string(),
            parsed.host_str().unwrap_or("").to_string(),
            parsed.path().to_string(),
        ),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let (host, path) = split_schemeless(raw);
            (String::new(), host.to_string(), path.to_string())
        }
        Err(e) => return Err(e.into()),
    };
    let tld = host.rsplit('.').next().unwrap_or("");
    let lowered = raw.to_lowercase();

    Ok(UrlFeatures {
        error: false,
        domain_length: host.chars().count() as u32,
        path_length: path.chars().count() as u32,
        subdomain_count: host.matches('.').count() as u32,
        has_https: scheme == "https",
        path_depth: path.split('/').filter(|segment| !segment.is_empty()).count() as u32,
        has_suspicious_tld: SUSPICIOUS_TLDS.contains(&tld),
        has_ip_address: IPV4_PATTERN.is_match(&host),
        has_at_symbol: raw.contains('@'),
        has_double_slash_redirect: raw.matches("//").count() > 1,
        special_char_count: URL_SPECIAL_CHAR.find_iter(raw).count() as u32,
        digit_count: raw.chars().filter(|c| c.is_ascii_digit()).count() as u32,
        has_suspicious_keywords: URL_KEYWORDS.iter().any(|kw| lowered.contains(kw)),
    })
}

/// `(host, path)` of a reference without a scheme. Query and fragment are
/// dropped; only a leading `//` introduces a host.
fn split_schemeless(raw: &str) -> (&str, &str) {
    let reference = raw.split(|c| c == '?' || c == '#').next().unwrap_or("");
    match reference.strip_prefix("//") {
        Some(rest) => match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        },
        None => ("", reference),
    }
}

struct HtmlSelectors {
    form: Selector,
    password_input: Selector,
    anchor: Selector,
    title: Selector,
    iframe: Selector,
    script: Selector,
    styled: Selector,
    image: Selector,
    icon_link: Selector,
}

impl HtmlSelectors {
    fn new() -> Result<Self, String> {
        let parse = |css: &str| Selector::parse(css).map_err(|e| format!("{css}: {e:?}"));
        Ok(Self {
            form: parse("form")?,
            password_input: parse("input[type=\"password\"]")?,
            anchor: parse("a[href]")?,
            title: parse("title")?,
            iframe: parse("iframe")?,
            script: parse("script")?,
            styled: parse("[style]")?,
            image: parse("img")?,
            icon_link: parse("link[rel*=\"icon\"]")?,
        })
    }
}

static SELECTORS: Lazy<Result<HtmlSelectors, String>> = Lazy::new(HtmlSelectors::new);

/// HTML and text features of fetched page markup, from a single parse.
/// CPU bound; callers on the runtime should run it on a blocking thread.
pub fn extract_page_features(markup: &str) -> (Result<HtmlFeatures, ExtractionError>, TextFeatures) {
    let document = Html::parse_document(markup);
    let html = html_features(&document);
    let text = extract_text_features(&visible_text(&document));
    (html, text)
}

fn html_features(document: &Html) -> Result<HtmlFeatures, ExtractionError> {
    let selectors = SELECTORS.as_ref().map_err(|e| ExtractionError::Selector(e.clone()))?;

    let title = document
        .select(&selectors.title)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();

    // Weak heuristic: any absolute link not prefixed by the page title counts.
    // An empty title prefixes everything, so no links count.
    let external_link_count = document
        .select(&selectors.anchor)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.starts_with("http") && !href.starts_with(title.as_str()))
        .count();

    let password_input_count = document.select(&selectors.password_input).count();

    let hidden_element_count = document
        .select(&selectors.styled)
        .filter_map(|el| el.value().attr("style"))
        .filter(|style| HIDDEN_STYLE.is_match(style))
        .count();

    let has_login_form = document.select(&selectors.form).any(|form| {
        let markup = form.html().to_lowercase();
        markup.contains("login") || markup.contains("password")
    });

    Ok(HtmlFeatures {
        error: false,
        form_count: document.select(&selectors.form).count() as u32,
        password_input_count: password_input_count as u32,
        external_link_count: external_link_count as u32,
        iframe_count: document.select(&selectors.iframe).count() as u32,
        script_count: document.select(&selectors.script).count() as u32,
        hidden_element_count: hidden_element_count as u32,
        image_count: document.select(&selectors.image).count() as u32,
        has_favicon: document.select(&selectors.icon_link).next().is_some(),
        has_password_field: password_input_count > 0,
        has_login_form,
    })
}

/// Text a reader would see: every text node outside `script` and `style`,
/// trimmed and joined with single spaces.
fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();

    for node in document.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style"))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }

    parts.join(" ")
}

/// Keyword and character statistics of visible page text.
pub fn extract_text_features(text: &str) -> TextFeatures {
    let total_chars = text.chars().count().max(1) as f64;
    let uppercase = text.chars().filter(|c| c.is_ascii_uppercase()).count();

    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let letters: usize = words.iter().map(|w| w.chars().count()).sum();
    let special = lowered
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
        .count();

    let matches = |list: &[&str]| list.iter().filter(|kw| lowered.contains(*kw)).count() as u32;

    TextFeatures {
        error: false,
        security_keyword_count: matches(SECURITY_KEYWORDS),
        urgency_keyword_count: matches(URGENCY_KEYWORDS),
        financial_keyword_count: matches(FINANCIAL_KEYWORDS),
        total_word_count: words.len() as u32,
        avg_word_length: letters as f64 / words.len().max(1) as f64,
        special_char_ratio: special as f64 / lowered.chars().count().max(1) as f64,
        uppercase_ratio: uppercase as f64 / total_chars,
        has_suspicious_phrases: SUSPICIOUS_PHRASES.iter().any(|p| lowered.contains(p)),
    }
}
