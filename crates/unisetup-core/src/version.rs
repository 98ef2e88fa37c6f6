use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;

use crate::error::UnisetupError;

pub const WILDCARD: char = 'x';

/// Release maturity tier, ordered by strength: final < patch < beta < alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReleaseStage {
    Final,
    Patch,
    Beta,
    Alpha,
}

impl ReleaseStage {
    pub const ALL: [ReleaseStage; 4] = [Self::Final, Self::Patch, Self::Beta, Self::Alpha];

    pub fn letter(self) -> char {
        match self {
            Self::Final => 'f',
            Self::Patch => 'p',
            Self::Beta => 'b',
            Self::Alpha => 'a',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'f' => Some(Self::Final),
            'p' => Some(Self::Patch),
            'b' => Some(Self::Beta),
            'a' => Some(Self::Alpha),
            _ => None,
        }
    }

    pub fn strength(self) -> u8 {
        match self {
            Self::Final => 1,
            Self::Patch => 2,
            Self::Beta => 3,
            Self::Alpha => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Final => "release",
            Self::Patch => "patch",
            Self::Beta => "beta",
            Self::Alpha => "alpha",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "release" | "final" | "f" => Some(Self::Final),
            "patch" | "p" => Some(Self::Patch),
            "beta" | "b" => Some(Self::Beta),
            "alpha" | "a" | "all" => Some(Self::Alpha),
            _ => None,
        }
    }
}

/// Stage ceiling applied when a version spec does not name a stage.
pub const DEFAULT_MATCH_STAGE: ReleaseStage = ReleaseStage::Patch;

/// A loosely specified version such as `5`, `5.3`, `5.3.2p` or `5.3.2p1`.
///
/// Unset numeric fields act as wildcards when matching and sort lowest. An unset
/// stage sorts as [`ReleaseStage::Final`] but stays distinguishable for matching.
#[derive(Debug, Clone, Copy)]
pub struct UnityVersion {
    pub major: u32,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
    pub stage: Option<ReleaseStage>,
    pub stage_number: Option<u32>,
}

impl UnityVersion {
    pub fn parse(input: &str) -> Result<Self> {
        let mut scanner = Scanner::new(input.trim());
        let major = match scanner.component() {
            Ok(Some(major)) => major,
            Ok(None) => return Err(format_error(input, "major version must be a number")),
            Err(reason) => return Err(format_error(input, reason)),
        };

        let mut numbers = [None, None];
        for slot in numbers.iter_mut() {
            if !scanner.eat('.') {
                break;
            }
            *slot = scanner.component().map_err(|reason| format_error(input, reason))?;
        }

        let mut stage = None;
        let mut stage_number = None;
        if let Some(letter) = scanner.next_char() {
            if letter != WILDCARD {
                stage = Some(ReleaseStage::from_letter(letter).ok_or_else(|| {
                    format_error(input, &format!("unknown release letter '{letter}'"))
                })?);
            }
            if !scanner.is_done() {
                stage_number = scanner
                    .component()
                    .map_err(|reason| format_error(input, reason))?;
            }
        }

        if !scanner.is_done() {
            return Err(format_error(input, "unexpected trailing characters"));
        }

        Ok(Self {
            major,
            minor: numbers[0],
            patch: numbers[1],
            stage,
            stage_number,
        })
    }

    pub fn is_concrete(&self) -> bool {
        self.minor.is_some()
            && self.patch.is_some()
            && self.stage.is_some()
            && self.stage_number.is_some()
    }

    pub fn ordering_stage(&self) -> ReleaseStage {
        self.stage.unwrap_or(ReleaseStage::Final)
    }

    /// Whether `candidate` satisfies this spec.
    ///
    /// Numeric fields set on both sides must be equal. The stage is a ceiling: the
    /// candidate's stage may not be looser than the requested one, and an unset
    /// stage allows final and patch releases only.
    pub fn matches(&self, candidate: &UnityVersion) -> bool {
        let numeric = [
            (Some(self.major), Some(candidate.major)),
            (self.minor, candidate.minor),
            (self.patch, candidate.patch),
            (self.stage_number, candidate.stage_number),
        ];
        if numeric
            .iter()
            .any(|(wanted, actual)| matches!((wanted, actual), (Some(w), Some(a)) if w != a))
        {
            return false;
        }

        let ceiling = self.stage.unwrap_or(DEFAULT_MATCH_STAGE);
        candidate.ordering_stage() <= ceiling
    }

    fn sort_key(&self) -> (u32, Option<u32>, Option<u32>, ReleaseStage, Option<u32>) {
        (
            self.major,
            self.minor,
            self.patch,
            self.ordering_stage(),
            self.stage_number,
        )
    }
}

fn format_error(input: &str, reason: &str) -> anyhow::Error {
    UnisetupError::Format {
        input: input.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl PartialEq for UnityVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for UnityVersion {}

impl PartialOrd for UnityVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnityVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for UnityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |value: Option<u32>| match value {
            Some(value) => value.to_string(),
            None => WILDCARD.to_string(),
        };
        write!(
            f,
            "{}.{}.{}{}{}",
            self.major,
            render(self.minor),
            render(self.patch),
            self.stage.map(ReleaseStage::letter).unwrap_or(WILDCARD),
            render(self.stage_number)
        )
    }
}

impl FromStr for UnityVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Sorts version strings ascending, dropping those that do not parse.
pub fn sort_version_strings<I, S>(versions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut parsed: Vec<(UnityVersion, String)> = versions
        .into_iter()
        .map(Into::into)
        .filter_map(|raw| match UnityVersion::parse(&raw) {
            Ok(version) => Some((version, raw)),
            Err(err) => {
                log::debug!("ignoring unparseable version '{raw}': {err}");
                None
            }
        })
        .collect();
    parsed.sort_by(|(left, left_raw), (right, right_raw)| {
        left.cmp(right).then_with(|| left_raw.cmp(right_raw))
    });
    parsed.dedup_by(|(_, left), (_, right)| left == right);
    parsed.into_iter().map(|(_, raw)| raw).collect()
}

struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn is_done(&self) -> bool {
        self.rest.is_empty()
    }

    fn eat(&mut self, expected: char) -> bool {
        match self.rest.strip_prefix(expected) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let mut chars = self.rest.chars();
        let next = chars.next()?;
        self.rest = chars.as_str();
        Some(next)
    }

    // A run of digits, or the wildcard placeholder.
    fn component(&mut self) -> std::result::Result<Option<u32>, &'static str> {
        if self.eat(WILDCARD) {
            return Ok(None);
        }
        let digits = self
            .rest
            .char_indices()
            .find(|(_, ch)| !ch.is_ascii_digit())
            .map(|(index, _)| index)
            .unwrap_or(self.rest.len());
        if digits == 0 {
            return Err("expected a number");
        }
        let (number, rest) = self.rest.split_at(digits);
        self.rest = rest;
        number
            .parse()
            .map(Some)
            .map_err(|_| "version component is out of range")
    }
}
