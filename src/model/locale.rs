use serde::Serialize;

/// One translation target, as known to the content tree and to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Locale {
    /// Directory name under the content root (`de`, `zh-CN`, ...).
    pub code: &'static str,
    /// Locale tag used by the store API (`de-DE`, `zh-Hans`, ...).
    pub remote_tag: &'static str,
    pub display_name: &'static str,
}

pub const SOURCE_CODE: &str = "en";

const CATALOG: &[Locale] = &[
    Locale { code: "en", remote_tag: "en-US", display_name: "English (U.S.)" },
    Locale { code: "zh-CN", remote_tag: "zh-Hans", display_name: "Chinese (Simplified)" },
    Locale { code: "zh-TW", remote_tag: "zh-Hant", display_name: "Chinese (Traditional)" },
    Locale { code: "de", remote_tag: "de-DE", display_name: "German" },
    Locale { code: "ja", remote_tag: "ja", display_name: "Japanese" },
    Locale { code: "ko", remote_tag: "ko", display_name: "Korean" },
    Locale { code: "pt-BR", remote_tag: "pt-BR", display_name: "Portuguese (Brazil)" },
    Locale { code: "es-MX", remote_tag: "es-MX", display_name: "Spanish (Mexico)" },
    Locale { code: "fr", remote_tag: "fr-FR", display_name: "French" },
    Locale { code: "it", remote_tag: "it", display_name: "Italian" },
    Locale { code: "ru", remote_tag: "ru", display_name: "Russian" },
];

impl Locale {
    pub fn is_source(&self) -> bool {
        self.code == SOURCE_CODE
    }
}

pub fn all() -> &'static [Locale] {
    CATALOG
}

pub fn source() -> &'static Locale {
    &CATALOG[0]
}

/// Every locale except the English source.
pub fn targets() -> impl Iterator<Item = &'static Locale> {
    CATALOG.iter().filter(|l| !l.is_source())
}

pub fn by_code(code: &str) -> Option<&'static Locale> {
    CATALOG.iter().find(|l| l.code == code)
}
