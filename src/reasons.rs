// Reason-code grouping.
//
// Raw `Cód.Motivo` values roll up to a handful of business categories. The
// mapping is total: every code is a known group, excluded, or its own group.
use clap::ValueEnum;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use crate::types::{ReasonGroup, Record};

static REASON_TABLE: Lazy<HashMap<&'static str, ReasonGroup>> = Lazy::new(|| {
    HashMap::from([
        ("PRL", ReasonGroup::Extension),
        ("ALT", ReasonGroup::Extension),
        ("DEC", ReasonGroup::Discount),
        ("CAN", ReasonGroup::Cancellation),
        ("REF", ReasonGroup::Cancellation),
        ("BXS", ReasonGroup::WriteOff),
        ("XXX", ReasonGroup::Excluded),
        ("CEN", ReasonGroup::Excluded),
        ("DEV", ReasonGroup::Excluded),
        ("YYY", ReasonGroup::Excluded),
    ])
});

/// Map a raw reason code to its group. Case-insensitive; surrounding
/// whitespace is ignored. Unknown codes pass through as `Other(CODE)`.
pub fn derive_grouped_reason(code: &str) -> ReasonGroup {
    let code = code.trim().to_uppercase();
    match REASON_TABLE.get(code.as_str()) {
        Some(group) => group.clone(),
        None => ReasonGroup::Other(code),
    }
}

/// How ALT instructions are counted.
///
/// ALT is both a due-date extension (it carries `Dias`) and a discount (it
/// carries `Desconto`). Under `DualCount` its amount also feeds the
/// Desconto/Abat. total, so ALT contributes to two categories at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AltPolicy {
    #[default]
    DualCount,
    ExtensionOnly,
}

impl fmt::Display for AltPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltPolicy::DualCount => f.write_str("dual-count"),
            AltPolicy::ExtensionOnly => f.write_str("extension-only"),
        }
    }
}

/// A selection of records by raw code and/or by group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReasonSet {
    codes: Vec<String>,
    groups: Vec<ReasonGroup>,
    any_grouped: bool,
}

impl ReasonSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.codes
            .extend(codes.into_iter().map(|c| c.as_ref().trim().to_uppercase()));
        self
    }

    pub fn with_group(mut self, group: ReasonGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Every record whose reason is not excluded, pass-through codes included.
    pub fn any_grouped() -> Self {
        Self {
            any_grouped: true,
            ..Self::default()
        }
    }

    /// Discount KPI scope: DEC, plus ALT when it is dual-counted.
    pub fn discount(policy: AltPolicy) -> Self {
        let set = Self::new().with_group(ReasonGroup::Discount);
        match policy {
            AltPolicy::DualCount => set.with_codes(["ALT"]),
            AltPolicy::ExtensionOnly => set,
        }
    }

    pub fn contains(&self, record: &Record) -> bool {
        let code = record.reason_code.trim().to_uppercase();
        if self.codes.iter().any(|c| *c == code) {
            return true;
        }
        if self.groups.is_empty() && !self.any_grouped {
            return false;
        }
        let group = derive_grouped_reason(&code);
        if self.any_grouped && !group.is_excluded() {
            return true;
        }
        self.groups.contains(&group)
    }
}
