use regex::{Captures, Regex};

use crate::model::locale::{self, Locale};

/// Rewrites configured base URLs (privacy policy, terms) into their
/// locale-qualified form: `https://example.com/privacy` becomes
/// `https://example.com/de/privacy` for `de`. A locale segment that is already
/// there, for any catalog locale, is replaced rather than stacked, so the
/// rewrite is idempotent.
#[derive(Debug, Clone)]
pub struct UrlLocalizer {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
struct Rule {
    prefix: String,
    tail: String,
    re: Regex,
}

impl UrlLocalizer {
    /// Base URLs without a path segment to anchor on are ignored.
    pub fn new(base_urls: &[&str]) -> Result<Self, regex::Error> {
        let mut codes: Vec<&str> = locale::all().iter().map(|l| l.code).collect();
        // Longest first so `pt-BR` wins over any shorter code sharing a prefix.
        codes.sort_by_key(|c| std::cmp::Reverse(c.len()));
        let codes = codes
            .iter()
            .map(|c| regex::escape(c))
            .collect::<Vec<_>>()
            .join("|");

        let mut rules = Vec::new();
        for base in base_urls {
            let Some((prefix, tail)) = split_base(base) else {
                continue;
            };
            let pattern = format!(
                r"{}/(?:(?:{})/)?{}(?P<end>[^A-Za-z0-9_\-]|$)",
                regex::escape(prefix),
                codes,
                regex::escape(tail)
            );
            rules.push(Rule {
                prefix: prefix.to_string(),
                tail: tail.to_string(),
                re: Regex::new(&pattern)?,
            });
        }

        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn localize(&self, text: &str, locale: &Locale) -> String {
        let mut out = text.to_string();

        for rule in &self.rules {
            let target = rule.url_for(locale);
            out = rule
                .re
                .replace_all(&out, |caps: &Captures<'_>| {
                    format!("{}{}", target, caps.name("end").map_or("", |m| m.as_str()))
                })
                .into_owned();
        }

        out
    }

    /// True when the text contains at least one configured URL, in any form.
    pub fn mentions_any(&self, text: &str) -> bool {
        self.rules.iter().any(|r| r.re.is_match(text))
    }

    pub fn localized_urls(&self, locale: &Locale) -> Vec<String> {
        self.rules.iter().map(|r| r.url_for(locale)).collect()
    }
}

impl Rule {
    fn url_for(&self, locale: &Locale) -> String {
        if locale.is_source() {
            format!("{}/{}", self.prefix, self.tail)
        } else {
            format!("{}/{}/{}", self.prefix, locale.code, self.tail)
        }
    }
}

fn split_base(base: &str) -> Option<(&str, &str)> {
    let base = base.trim().trim_end_matches('/');
    let path_start = base.find("://").map_or(0, |i| i + 3);
    let (prefix, tail) = base.rsplit_once('/')?;
    if prefix.len() < path_start || tail.is_empty() {
        return None;
    }
    Some((prefix, tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVACY: &str = "https://example.com/privacy";
    const TERMS: &str = "https://example.com/legal/terms.html";

    fn localizer() -> UrlLocalizer {
        UrlLocalizer::new(&[PRIVACY, TERMS]).unwrap()
    }

    fn loc(code: &str) -> &'static Locale {
        locale::by_code(code).unwrap()
    }

    #[test]
    fn inserts_locale_segment() {
        let text = "Privacy: https://example.com/privacy\nTerms: https://example.com/legal/terms.html.";
        let out = localizer().localize(text, loc("de"));
        assert_eq!(
            out,
            "Privacy: https://example.com/de/privacy\nTerms: https://example.com/legal/de/terms.html."
        );
    }

    #[test]
    fn applying_twice_is_a_no_op() {
        let l = localizer();
        let text = "See https://example.com/privacy and https://example.com/legal/terms.html";
        for code in ["de", "pt-BR", "zh-TW", "en"] {
            let once = l.localize(text, loc(code));
            assert_eq!(l.localize(&once, loc(code)), once, "locale {code}");
        }
    }

    #[test]
    fn replaces_another_locales_segment() {
        let text = "https://example.com/fr/privacy";
        assert_eq!(localizer().localize(text, loc("ja")), "https://example.com/ja/privacy");
        assert_eq!(localizer().localize(text, loc("en")), PRIVACY);
    }

    #[test]
    fn leaves_longer_paths_alone() {
        let text = "https://example.com/privacy-policy";
        assert_eq!(localizer().localize(text, loc("de")), text);
        assert!(!localizer().mentions_any(text));
    }

    #[test]
    fn bare_host_is_not_a_rule() {
        let l = UrlLocalizer::new(&["https://example.com", "https://example.com/"]).unwrap();
        assert!(l.is_empty());
    }
}
