use std::fmt;

use crate::error::ConfigError;
use crate::model::field::FieldKind;

/// Run phases, always executed in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Translate,
    FixUrls,
    Send,
}

impl Phase {
    pub fn planned(translate: bool, fix_urls: bool, send: bool) -> Vec<Phase> {
        [
            (translate, Phase::Translate),
            (fix_urls, Phase::FixUrls),
            (send, Phase::Send),
        ]
        .into_iter()
        .filter_map(|(on, p)| on.then_some(p))
        .collect()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Translate => "translate",
            Phase::FixUrls => "fix-urls",
            Phase::Send => "send",
        })
    }
}

/// `--fields` values. `all` expands to every field; duplicates collapse.
pub fn parse_fields(args: &[String]) -> Result<Vec<FieldKind>, ConfigError> {
    let mut out: Vec<FieldKind> = Vec::new();
    for a in args {
        if a.trim() == "all" {
            return Ok(FieldKind::ALL.to_vec());
        }
        let kind = FieldKind::parse(a).ok_or_else(|| ConfigError::UnknownField(a.clone()))?;
        if !out.contains(&kind) {
            out.push(kind);
        }
    }
    Ok(out)
}
