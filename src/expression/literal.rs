//! Payloads of the composite literal nodes and number formatting.

use std::fmt;

use crate::expression::node::Node;

/// A point in time with microsecond precision, always in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    micros: i64,
}

const MICROS_PER_SECOND: i64 = 1_000_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// Largest year with a two-byte encoded year component.
pub const MAX_YEAR: i64 = (1 << 14) - 1;

impl Timestamp {
    pub fn from_unix_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Build a timestamp from calendar parts; `None` if a part is out of range.
    pub fn from_parts(
        year: i64,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        micro: u32,
    ) -> Option<Self> {
        if !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year, month)
            || hour > 23
            || minute > 59
            || second > 59
            || micro >= 1_000_000
        {
            return None;
        }
        let days = days_from_civil(year, month, day);
        let secs = days
            .checked_mul(SECONDS_PER_DAY)?
            .checked_add((hour * 3600 + minute * 60 + second) as i64)?;
        let micros = secs
            .checked_mul(MICROS_PER_SECOND)?
            .checked_add(micro as i64)?;
        Some(Self { micros })
    }

    pub fn unix_micros(&self) -> i64 {
        self.micros
    }

    pub fn year(&self) -> i64 {
        self.parts().0
    }

    /// (year, month, day, hour, minute, second, microsecond)
    fn parts(&self) -> (i64, u32, u32, u32, u32, u32, u32) {
        let secs = self.micros.div_euclid(MICROS_PER_SECOND);
        let micro = self.micros.rem_euclid(MICROS_PER_SECOND) as u32;
        let days = secs.div_euclid(SECONDS_PER_DAY);
        let sod = secs.rem_euclid(SECONDS_PER_DAY) as u32;
        let (y, m, d) = civil_from_days(days);
        (y, m, d, sod / 3600, (sod / 60) % 60, sod % 60, micro)
    }
}

impl fmt::Display for Timestamp {
    /// RFC 3339 with trailing zeros of the fraction removed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (y, mo, d, h, mi, s, us) = self.parts();
        write!(f, "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}", y, mo, d, h, mi, s)?;
        if us != 0 {
            let frac = format!("{:06}", us);
            write!(f, ".{}", frac.trim_end_matches('0'))?;
        }
        f.write_str("Z")
    }
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

// Days since 1970-01-01 in the proleptic Gregorian calendar.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let m = month as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + if m <= 2 { 1 } else { 0 };
    (y, m, d)
}

/// A field of a struct literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: String,
    pub value: Node,
}

impl Field {
    pub fn new(label: impl Into<String>, value: Node) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// A literal struct; every field value is a constant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    pub fields: Vec<Field>,
}

impl Struct {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// The value of the first field labelled `label`.
    pub fn field(&self, label: &str) -> Option<&Node> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| &f.value)
    }
}

/// A literal list; every item is a constant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct List {
    pub values: Vec<Node>,
}

impl List {
    pub fn new(values: Vec<Node>) -> Self {
        Self { values }
    }
}

/// Format a float using the shortest representation that round-trips,
/// switching to exponent notation for very large and very small
/// magnitudes (`1e+21`, `1.5e-07`).
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let sci = format!("{:e}", v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if !(-4..21).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }
    format!("{}", v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_display() {
        let t = Timestamp::from_parts(2021, 3, 4, 5, 6, 7, 0).unwrap();
        assert_eq!(t.to_string(), "2021-03-04T05:06:07Z");
        let t = Timestamp::from_parts(1969, 12, 31, 23, 59, 59, 120_000).unwrap();
        assert_eq!(t.to_string(), "1969-12-31T23:59:59.12Z");
        assert_eq!(t.unix_micros(), -880_000);
    }

    #[test]
    fn test_timestamp_parts_roundtrip() {
        let t = Timestamp::from_parts(2000, 2, 29, 12, 0, 0, 1).unwrap();
        let again = Timestamp::from_unix_micros(t.unix_micros());
        assert_eq!(again.to_string(), "2000-02-29T12:00:00.000001Z");
        assert_eq!(again.year(), 2000);
        assert!(Timestamp::from_parts(2001, 2, 29, 0, 0, 0, 0).is_none());
    }

    #[test]
    fn test_struct_field_lookup() {
        let s = Struct::new(vec![
            Field::new("a", Node::Integer(1)),
            Field::new("b", Node::string("x")),
        ]);
        assert_eq!(s.field("b"), Some(&Node::string("x")));
        assert!(s.field("c").is_none());
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(1e21), "1e+21");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(f64::NAN), "NaN");
    }
}
