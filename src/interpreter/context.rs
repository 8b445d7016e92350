use rug::{
    Float,
    float::Round,
    ops::AssignRound,
};

use crate::error::{ParseError, RuntimeError};

/// Smallest numeric base accepted for input and output.
pub const MIN_BASE: i32 = 2;
/// Largest numeric base accepted for input and output.
pub const MAX_BASE: i32 = 36;

/// Checks that a numeric base lies in the supported range.
///
/// # Errors
/// Returns `RuntimeError::InvalidBase` for bases outside `2..=36`.
pub const fn check_base(base: i32) -> Result<(), RuntimeError> {
    if base < MIN_BASE || base > MAX_BASE {
        return Err(RuntimeError::InvalidBase { base });
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One of the seven symbolic rounding modes.
///
/// The names follow the usual short spellings `N`, `Z`, `U`, `D`, `A`, `F`
/// and `NA`. `Faithful` and `NearestAway` have no distinct binding in the
/// underlying library and round like `Nearest`; their symbolic identity is
/// preserved so they display back as configured.
pub enum RoundMode {
    /// Round to nearest, with ties to even (`N`).
    Nearest,
    /// Round toward zero (`Z`).
    TowardZero,
    /// Round toward positive infinity (`U`).
    Up,
    /// Round toward negative infinity (`D`).
    Down,
    /// Round away from zero (`A`).
    AwayZero,
    /// Faithful rounding (`F`).
    Faithful,
    /// Round to nearest, with ties away from zero (`NA`).
    NearestAway,
}

impl RoundMode {
    /// Parses a rounding-mode name, case-insensitively.
    ///
    /// # Errors
    /// Returns `RuntimeError::UnknownRoundingMode` if the name is not one of
    /// `N`, `Z`, `U`, `D`, `A`, `F`, `NA`.
    pub fn parse(name: &str) -> Result<Self, RuntimeError> {
        match name.to_ascii_uppercase().as_str() {
            "N" => Ok(Self::Nearest),
            "Z" => Ok(Self::TowardZero),
            "U" => Ok(Self::Up),
            "D" => Ok(Self::Down),
            "A" => Ok(Self::AwayZero),
            "F" => Ok(Self::Faithful),
            "NA" => Ok(Self::NearestAway),
            _ => Err(RuntimeError::UnknownRoundingMode { name: name.to_string() }),
        }
    }

    /// Returns the short name of the mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nearest => "N",
            Self::TowardZero => "Z",
            Self::Up => "U",
            Self::Down => "D",
            Self::AwayZero => "A",
            Self::Faithful => "F",
            Self::NearestAway => "NA",
        }
    }

    /// Returns a one-line description of the mode.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Nearest => "Round to nearest, with ties to even",
            Self::TowardZero => "Round toward zero",
            Self::Up => "Round toward +Infinity",
            Self::Down => "Round toward -Infinity",
            Self::AwayZero => "Round away from zero",
            Self::Faithful => "Faithful rounding",
            Self::NearestAway => "Round to nearest, with ties away from zero",
        }
    }

    /// Maps the symbolic mode onto the library rounding mode.
    #[must_use]
    pub const fn to_round(self) -> Round {
        match self {
            Self::Nearest | Self::Faithful | Self::NearestAway => Round::Nearest,
            Self::TowardZero => Round::Zero,
            Self::Up => Round::Up,
            Self::Down => Round::Down,
            Self::AwayZero => Round::AwayZero,
        }
    }
}

impl std::fmt::Display for RoundMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
/// The evaluation context shared by an engine instance.
///
/// Holds everything number construction, parsing and rendering depend on:
/// working precision, rounding mode, input and output base, output digit
/// count, and the timestamp output format. Every field is mutable at runtime
/// and is re-read by each subsequent evaluation.
pub struct MathContext {
    /// Working precision for newly constructed numbers, in bits.
    pub precision:   u32,
    /// Rounding mode applied to arithmetic and rendering.
    pub rounding:    RoundMode,
    /// Base used when converting numeric literals.
    pub input_base:  i32,
    /// Base used when rendering numbers.
    pub output_base: i32,
    /// Number of significant digits to render; `0` means "as many digits as
    /// needed to read the value back exactly".
    pub digits:      usize,
    /// strftime-style format used when rendering timestamps.
    pub date_format: String,
}

impl Default for MathContext {
    fn default() -> Self {
        Self { precision:   128,
               rounding:    RoundMode::Nearest,
               input_base:  10,
               output_base: 10,
               digits:      30,
               date_format: String::from("%Y-%m-%d %H:%M:%S"), }
    }
}

impl MathContext {
    /// Constructs a number from any assignable source at the context's
    /// precision and rounding mode.
    pub fn number<T>(&self, source: T) -> Float
        where Float: AssignRound<T, Round = Round, Ordering = std::cmp::Ordering>
    {
        Float::with_val_round(self.precision, source, self.rounding.to_round()).0
    }

    /// Converts a numeric literal in the context's input base.
    ///
    /// # Errors
    /// Returns `ParseError::InvalidNumber` if the literal is not a valid
    /// numeral in the current input base.
    pub fn parse_number(&self, literal: &str) -> Result<Float, ParseError> {
        let incomplete =
            Float::parse_radix(literal, self.input_base).map_err(|_| ParseError::InvalidNumber { literal: literal.to_string() })?;
        Ok(self.number(incomplete))
    }

    /// Renders a number in the context's output base with the configured
    /// digit count and rounding mode.
    ///
    /// Finite values close to one are written in positional notation,
    /// everything else falls back to exponent notation. The exponent marker
    /// is `e` for bases up to 10 and `@` above, where `e` is a digit.
    #[must_use]
    pub fn format_number(&self, value: &Float) -> String {
        if value.is_nan() {
            return String::from("nan");
        }
        if value.is_infinite() {
            return if value.is_sign_negative() { String::from("-inf") } else { String::from("inf") };
        }
        if value.is_zero() {
            return String::from("0");
        }

        let digits = if self.digits == 0 { None } else { Some(self.digits) };
        let (negative, mantissa, exponent) =
            value.to_sign_string_exp_round(self.output_base, digits, self.rounding.to_round());
        let exponent = exponent.unwrap_or(0);

        let trimmed = mantissa.trim_end_matches('0');
        let mantissa = if trimmed.is_empty() { "0" } else { trimmed };
        let length = i32::try_from(mantissa.len()).unwrap_or(i32::MAX);

        let sign = if negative { "-" } else { "" };
        let marker = if self.output_base <= 10 { 'e' } else { '@' };

        if exponent > 0 && exponent <= length {
            // Point inside (or right after) the digit string.
            let split = exponent as usize;
            if split == mantissa.len() {
                return format!("{sign}{mantissa}");
            }
            return format!("{sign}{}.{}", &mantissa[..split], &mantissa[split..]);
        }
        if exponent > length && exponent <= length + 16 {
            let zeros = "0".repeat((exponent - length) as usize);
            return format!("{sign}{mantissa}{zeros}");
        }
        if exponent <= 0 && exponent > -6 {
            let zeros = "0".repeat(exponent.unsigned_abs() as usize);
            return format!("{sign}0.{zeros}{mantissa}");
        }

        // Exponent notation: d.ddd * base^(exponent - 1).
        let (head, tail) = mantissa.split_at(1);
        if tail.is_empty() {
            format!("{sign}{head}{marker}{}", exponent - 1)
        } else {
            format!("{sign}{head}.{tail}{marker}{}", exponent - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> MathContext {
        MathContext::default()
    }

    #[test]
    fn parses_and_formats_decimal() {
        let ctx = context();
        let value = ctx.parse_number("3.14").unwrap();
        assert_eq!(ctx.format_number(&value), "3.14");
        assert_eq!(ctx.format_number(&ctx.parse_number("255").unwrap()), "255");
        assert_eq!(ctx.format_number(&ctx.parse_number("0.5").unwrap()), "0.5");
        assert_eq!(ctx.format_number(&ctx.parse_number("0").unwrap()), "0");
    }

    #[test]
    fn hexadecimal_round_trip() {
        let mut ctx = context();
        ctx.input_base = 16;
        ctx.output_base = 16;
        ctx.digits = 0;
        let value = ctx.parse_number("ff").unwrap();
        assert_eq!(ctx.format_number(&value), "ff");
    }

    #[test]
    fn large_and_small_magnitudes_use_exponent_notation() {
        let ctx = context();
        let large = ctx.parse_number("1e100").unwrap();
        assert_eq!(ctx.format_number(&large), "1e100");
        let small = ctx.parse_number("1e-10").unwrap();
        assert_eq!(ctx.format_number(&small), "1e-10");
    }

    #[test]
    fn special_values_have_fixed_spellings() {
        let ctx = context();
        let nan = Float::with_val(53, rug::float::Special::Nan);
        let inf = Float::with_val(53, rug::float::Special::Infinity);
        assert_eq!(ctx.format_number(&nan), "nan");
        assert_eq!(ctx.format_number(&inf), "inf");
        assert_eq!(ctx.format_number(&-inf), "-inf");
    }

    #[test]
    fn round_mode_names_parse_back() {
        for name in ["N", "Z", "U", "D", "A", "F", "NA"] {
            let mode = RoundMode::parse(name).unwrap();
            assert_eq!(mode.name(), name);
        }
        assert_eq!(RoundMode::parse("na").unwrap(), RoundMode::NearestAway);
        assert!(RoundMode::parse("X").is_err());
    }
}
