use crate::policy::{Policy, PolicySet};
use bon::bon;
use std::fmt;
use std::ops::Range;
use winnow::ascii::{line_ending, space0, till_line_ending};
use winnow::combinator::{alt, empty, opt, preceded, separated};
use winnow::error::ContextError;
use winnow::stream::Offset;
use winnow::token::{take_till, take_while};
use winnow::Parser;

/// Parameters of the time-of-flight matching. Fixed for the lifetime of a
/// [`Matcher`](crate::Matcher).
///
/// All times are in nanoseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Matching policies to run for every trigger hit.
    pub policies: PolicySet,
    /// Maximum (exclusive) time difference between coincident signals.
    pub coincidence_window: f64,
    /// Delay subtracted from all light-detector times.
    pub optical_delay: f64,
    pub trigger_hit_threshold: f64,
    pub flash_pe_threshold: f64,
    pub hit_pe_threshold: f64,
    /// Lower edge (inclusive) of the beam window for trigger hits.
    pub beam_window_low: f64,
    /// Upper edge (inclusive) of the beam window for trigger hits.
    pub beam_window_high: f64,
}

#[bon]
impl Config {
    #[builder]
    pub fn new(
        #[builder(field)] policies: PolicySet,
        coincidence_window: f64,
        #[builder(default)] optical_delay: f64,
        #[builder(default)] trigger_hit_threshold: f64,
        #[builder(default)] flash_pe_threshold: f64,
        #[builder(default)] hit_pe_threshold: f64,
        beam_window_low: f64,
        beam_window_high: f64,
    ) -> Self {
        Self {
            policies,
            coincidence_window,
            optical_delay,
            trigger_hit_threshold,
            flash_pe_threshold,
            hit_pe_threshold,
            beam_window_low,
            beam_window_high,
        }
    }
}

impl<S: config_builder::State> ConfigBuilder<S> {
    /// Enable a matching [`Policy`].
    pub fn enable(mut self, policy: Policy) -> Self {
        self.policies.insert(policy);
        self
    }
}

// Numeric parameters of the text format.
#[derive(Clone, Copy, Debug)]
enum Field {
    CoincidenceWindow,
    OpticalDelay,
    TriggerHitThreshold,
    FlashPeThreshold,
    HitPeThreshold,
    BeamWindowLow,
    BeamWindowHigh,
}

impl Field {
    const ALL: [Field; 7] = [
        Field::CoincidenceWindow,
        Field::OpticalDelay,
        Field::TriggerHitThreshold,
        Field::FlashPeThreshold,
        Field::HitPeThreshold,
        Field::BeamWindowLow,
        Field::BeamWindowHigh,
    ];

    fn key(self) -> &'static str {
        match self {
            Field::CoincidenceWindow => "coincidence_window",
            Field::OpticalDelay => "optical_delay",
            Field::TriggerHitThreshold => "trigger_hit_threshold",
            Field::FlashPeThreshold => "flash_pe_threshold",
            Field::HitPeThreshold => "hit_pe_threshold",
            Field::BeamWindowLow => "beam_window_low",
            Field::BeamWindowHigh => "beam_window_high",
        }
    }
    // Fields without a default value.
    fn is_required(self) -> bool {
        matches!(
            self,
            Field::CoincidenceWindow | Field::BeamWindowLow | Field::BeamWindowHigh
        )
    }

    fn get(self, config: &Config) -> f64 {
        match self {
            Field::CoincidenceWindow => config.coincidence_window,
            Field::OpticalDelay => config.optical_delay,
            Field::TriggerHitThreshold => config.trigger_hit_threshold,
            Field::FlashPeThreshold => config.flash_pe_threshold,
            Field::HitPeThreshold => config.hit_pe_threshold,
            Field::BeamWindowLow => config.beam_window_low,
            Field::BeamWindowHigh => config.beam_window_high,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in Field::ALL {
            writeln!(f, "{}: {}", field.key(), field.get(self))?;
        }
        let text = Policy::ALL
            .iter()
            .map(|p| format!("{}: {}", p.key(), self.policies.contains(*p)))
            .collect::<Vec<_>>()
            .join("\n");

        write!(f, "{text}")
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry<'s> {
    key: &'s str,
    value: &'s str,
}

fn comment<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    preceded('#', till_line_ending).parse_next(input)
}

fn entry<'s>(input: &mut &'s str) -> winnow::Result<Entry<'s>> {
    let key = take_while(1.., ('a'..='z', 'A'..='Z', '0'..='9', '_')).parse_next(input)?;
    let _ = (space0, ':', space0).parse_next(input)?;
    let value = take_till(0.., ['#', '\r', '\n'])
        .map(str::trim_end)
        .parse_next(input)?;
    let _ = opt(comment).parse_next(input)?;

    Ok(Entry { key, value })
}

// Blank and comment lines are `None`.
fn parse_line<'s>(input: &mut &'s str) -> winnow::Result<Option<Entry<'s>>> {
    let _ = space0.parse_next(input)?;
    alt((comment.value(None), entry.map(Some), empty.value(None))).parse_next(input)
}

/// What went wrong when parsing a [`Config`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A line is not a `key: value` pair, a comment, or blank.
    Syntax,
    UnknownKey(String),
    DuplicateKey(String),
    /// The value of a key has the wrong type.
    InvalidValue {
        key: String,
        expected: &'static str,
    },
    MissingKey(&'static str),
    /// All the matching policies are disabled.
    NoPolicy,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "invalid line starting here"),
            ErrorKind::UnknownKey(key) => write!(f, "unknown key `{key}`"),
            ErrorKind::DuplicateKey(key) => write!(f, "duplicate key `{key}`"),
            ErrorKind::InvalidValue { key, expected } => {
                write!(f, "invalid value for `{key}`, expected {expected}")
            }
            ErrorKind::MissingKey(key) => write!(f, "missing key `{key}`"),
            ErrorKind::NoPolicy => write!(f, "no matching policy is enabled"),
        }
    }
}

/// The error type returned when parsing a [`Config`] fails.
#[derive(Debug)]
pub struct ParseError {
    input: String,
    span: Option<Range<usize>>,
    kind: ErrorKind,
}

impl ParseError {
    fn from_parse(error: winnow::error::ParseError<&str, ContextError>) -> Self {
        let input = error.input().to_string();
        let span = error.char_span();
        Self {
            input,
            span: Some(span),
            kind: ErrorKind::Syntax,
        }
    }
    // `token` has to be a slice of `input`.
    fn at(input: &str, token: &str, kind: ErrorKind) -> Self {
        let start = token.offset_from(&input);
        Self {
            input: input.to_string(),
            span: Some(start..start + token.len()),
            kind,
        }
    }

    fn without_span(input: &str, kind: ErrorKind) -> Self {
        Self {
            input: input.to_string(),
            span: None,
            kind,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.kind.to_string();
        let mut message = annotate_snippets::Level::Error.title(&title);
        if let Some(span) = &self.span {
            message = message.snippet(
                annotate_snippets::Snippet::source(&self.input)
                    .fold(true)
                    .annotation(annotate_snippets::Level::Error.span(span.clone())),
            );
        }
        let renderer = annotate_snippets::Renderer::plain();
        let rendered = renderer.render(message);
        write!(f, "{rendered}")
    }
}

impl std::error::Error for ParseError {}

fn parse_number(input: &str, entry: Entry<'_>) -> Result<f64, ParseError> {
    entry.value.parse().map_err(|_| {
        ParseError::at(
            input,
            entry.value,
            ErrorKind::InvalidValue {
                key: entry.key.to_string(),
                expected: "a number",
            },
        )
    })
}

fn parse_bool(input: &str, entry: Entry<'_>) -> Result<bool, ParseError> {
    match entry.value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::at(
            input,
            entry.value,
            ErrorKind::InvalidValue {
                key: entry.key.to_string(),
                expected: "`true` or `false`",
            },
        )),
    }
}

impl std::str::FromStr for Config {
    type Err = ParseError;

    /// Parse a [`Config`] from a list of `key: value` lines. Blank lines and
    /// `#` comments are ignored. Thresholds and the optical delay default to
    /// zero, and policies default to disabled.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tof::config::Config;
    /// # use tof::policy::Policy;
    /// # use std::str::FromStr;
    /// let config = Config::from_str(
    ///     "# beam spill
    /// coincidence_window: 10
    /// beam_window_low: 0
    /// beam_window_high: 1600
    /// closest_flash: true",
    /// )?;
    /// assert_eq!(config.coincidence_window, 10.0);
    /// assert!(config.policies.contains(Policy::ClosestFlash));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let entries: Vec<Option<Entry<'_>>> = separated(0.., parse_line, line_ending)
            .parse(input)
            .map_err(ParseError::from_parse)?;

        let mut numbers = [None; Field::ALL.len()];
        let mut policies = PolicySet::new();
        let mut seen_policies = PolicySet::new();
        for entry in entries.into_iter().flatten() {
            if let Some(field) = Field::ALL.into_iter().find(|f| f.key() == entry.key) {
                let slot = &mut numbers[field as usize];
                if slot.is_some() {
                    let kind = ErrorKind::DuplicateKey(entry.key.to_string());
                    return Err(ParseError::at(input, entry.key, kind));
                }
                *slot = Some(parse_number(input, entry)?);
            } else if let Some(policy) = Policy::ALL.into_iter().find(|p| p.key() == entry.key)
            {
                if !seen_policies.insert(policy) {
                    let kind = ErrorKind::DuplicateKey(entry.key.to_string());
                    return Err(ParseError::at(input, entry.key, kind));
                }
                if parse_bool(input, entry)? {
                    policies.insert(policy);
                }
            } else {
                let kind = ErrorKind::UnknownKey(entry.key.to_string());
                return Err(ParseError::at(input, entry.key, kind));
            }
        }

        let value = |field: Field| match numbers[field as usize] {
            Some(value) => Ok(value),
            None if field.is_required() => Err(ParseError::without_span(
                input,
                ErrorKind::MissingKey(field.key()),
            )),
            None => Ok(0.0),
        };
        let config = Config {
            policies,
            coincidence_window: value(Field::CoincidenceWindow)?,
            optical_delay: value(Field::OpticalDelay)?,
            trigger_hit_threshold: value(Field::TriggerHitThreshold)?,
            flash_pe_threshold: value(Field::FlashPeThreshold)?,
            hit_pe_threshold: value(Field::HitPeThreshold)?,
            beam_window_low: value(Field::BeamWindowLow)?,
            beam_window_high: value(Field::BeamWindowHigh)?,
        };
        if config.policies.is_empty() {
            return Err(ParseError::without_span(input, ErrorKind::NoPolicy));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const MINIMAL: &str = "coincidence_window: 10
beam_window_low: 0
beam_window_high: 1600
largest_hit: true";

    #[test]
    fn config_builder() {
        let config = Config::builder()
            .enable(Policy::ClosestHit)
            .enable(Policy::LargestFlash)
            .coincidence_window(10.0)
            .beam_window_low(-5.0)
            .beam_window_high(5.0)
            .hit_pe_threshold(2.0)
            .build();

        assert_eq!(
            config.policies.iter().collect::<Vec<_>>(),
            vec![Policy::ClosestHit, Policy::LargestFlash]
        );
        assert_eq!(config.coincidence_window, 10.0);
        assert_eq!(config.optical_delay, 0.0);
        assert_eq!(config.trigger_hit_threshold, 0.0);
        assert_eq!(config.flash_pe_threshold, 0.0);
        assert_eq!(config.hit_pe_threshold, 2.0);
        assert_eq!(config.beam_window_low, -5.0);
        assert_eq!(config.beam_window_high, 5.0);
    }

    #[test]
    fn config_from_str_minimal() {
        let config = Config::from_str(MINIMAL).unwrap();
        let expected = Config::builder()
            .enable(Policy::LargestHit)
            .coincidence_window(10.0)
            .beam_window_low(0.0)
            .beam_window_high(1600.0)
            .build();
        assert_eq!(config, expected);
    }

    #[test]
    fn config_from_str_full() {
        let string = "
# Coincidence
coincidence_window: 10.5   # ns
optical_delay:-3

  trigger_hit_threshold : 100
flash_pe_threshold: 50
hit_pe_threshold: 5
beam_window_low: -1e3
beam_window_high: 1600
largest_hit: false
closest_flash: true
closest_flash_earliest_hit: true
";
        let config = Config::from_str(string).unwrap();

        assert_eq!(config.coincidence_window, 10.5);
        assert_eq!(config.optical_delay, -3.0);
        assert_eq!(config.trigger_hit_threshold, 100.0);
        assert_eq!(config.flash_pe_threshold, 50.0);
        assert_eq!(config.hit_pe_threshold, 5.0);
        assert_eq!(config.beam_window_low, -1000.0);
        assert_eq!(config.beam_window_high, 1600.0);
        assert_eq!(
            config.policies,
            PolicySet::from([Policy::ClosestFlash, Policy::ClosestFlashEarliestHit])
        );
    }

    #[test]
    fn config_from_str_crlf() {
        let string = MINIMAL.replace('\n', "\r\n");
        assert_eq!(
            Config::from_str(&string).unwrap(),
            Config::from_str(MINIMAL).unwrap()
        );
    }

    #[test]
    fn config_to_string() {
        let config = Config::builder()
            .enable(Policy::ClosestHit)
            .coincidence_window(10.0)
            .optical_delay(2.5)
            .beam_window_low(0.0)
            .beam_window_high(1600.0)
            .build();

        assert_eq!(
            config.to_string(),
            "coincidence_window: 10
optical_delay: 2.5
trigger_hit_threshold: 0
flash_pe_threshold: 0
hit_pe_threshold: 0
beam_window_low: 0
beam_window_high: 1600
largest_hit: false
closest_hit: true
largest_flash: false
closest_flash: false
largest_flash_earliest_hit: false
closest_flash_earliest_hit: false"
        );
        assert_eq!(Config::from_str(&config.to_string()).unwrap(), config);
    }

    #[test]
    fn config_syntax_error() {
        let string = "coincidence_window: 10\nthis is not valid\n";
        let err = Config::from_str(string).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Syntax);
        assert!(err.to_string().contains("invalid line starting here"));
    }

    #[test]
    fn config_unknown_key() {
        let string = format!("{MINIMAL}\nlargest_pmt: true");
        let err = Config::from_str(&string).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownKey("largest_pmt".to_string()));
        assert_eq!(err.span, Some(MINIMAL.len() + 1..MINIMAL.len() + 12));
        assert!(err.to_string().contains("unknown key `largest_pmt`"));
    }

    #[test]
    fn config_duplicate_key() {
        let string = format!("{MINIMAL}\ncoincidence_window: 5");
        let err = Config::from_str(&string).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::DuplicateKey("coincidence_window".to_string())
        );

        let string = format!("{MINIMAL}\nlargest_hit: false");
        let err = Config::from_str(&string).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::DuplicateKey("largest_hit".to_string())
        );
    }

    #[test]
    fn config_invalid_value() {
        let string = MINIMAL.replace("10", "ten");
        let err = Config::from_str(&string).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::InvalidValue {
                key: "coincidence_window".to_string(),
                expected: "a number"
            }
        );
        assert_eq!(err.span, Some(20..23));

        let string = MINIMAL.replace("true", "yes");
        let err = Config::from_str(&string).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::InvalidValue {
                key: "largest_hit".to_string(),
                expected: "`true` or `false`"
            }
        );
    }

    #[test]
    fn config_missing_key() {
        let string = MINIMAL.replace("beam_window_high: 1600", "");
        let err = Config::from_str(&string).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MissingKey("beam_window_high"));
        assert!(err.to_string().contains("missing key `beam_window_high`"));
    }

    #[test]
    fn config_no_policy() {
        let string = MINIMAL.replace("true", "false");
        let err = Config::from_str(&string).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NoPolicy);
    }
}
