use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::sheet::CellValue;

/// Largest serial Excel will display (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

const TIME_SUFFIXES: &[&str] = &[" %H:%M:%S", "T%H:%M:%S", " %H:%M"];

/// Excel 1900-system serial → datetime. Day 0 is 1899-12-30, which also
/// absorbs the phantom 1900-02-29.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_EXCEL_SERIAL + 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.trunc() as i64;
    let secs = (serial.fract() * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::days(days) + Duration::seconds(secs))
}

/// Turns cell values into calendar dates, leniently.
#[derive(Clone, Debug)]
pub struct DateParser {
    formats: Vec<String>,
}

impl DateParser {
    pub fn new(formats: &[String]) -> Self {
        Self {
            formats: formats.to_vec(),
        }
    }

    /// `None` for empty or unrecognised values; never fails.
    pub fn parse_cell(&self, cell: &CellValue) -> Option<NaiveDate> {
        match cell {
            CellValue::DateTime(dt) => Some(dt.date()),
            CellValue::Number(v) if (1.0..=MAX_EXCEL_SERIAL).contains(v) => {
                excel_serial_to_datetime(*v).map(|dt| dt.date())
            }
            CellValue::Text(s) => self.parse_str(s),
            _ => None,
        }
    }

    pub fn parse_str(&self, raw: &str) -> Option<NaiveDate> {
        let s = raw.trim().trim_matches('"');
        if s.is_empty() {
            return None;
        }
        for fmt in &self.formats {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return Some(d);
            }
            for suffix in TIME_SUFFIXES {
                let full = format!("{fmt}{suffix}");
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, &full) {
                    return Some(dt.date());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn parser() -> DateParser {
        DateParser::new(&Config::default().date_formats)
    }

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn text_formats() {
        let p = parser();
        assert_eq!(p.parse_str("2024-01-01"), ymd(2024, 1, 1));
        assert_eq!(p.parse_str(" 2024/03/05 "), ymd(2024, 3, 5));
        assert_eq!(p.parse_str("05/03/2024"), ymd(2024, 3, 5));
        assert_eq!(p.parse_str("05.03.2024"), ymd(2024, 3, 5));
        assert_eq!(p.parse_str("2024-01-01 13:45:00"), ymd(2024, 1, 1));
        assert_eq!(p.parse_str("2024-01-01T13:45:00"), ymd(2024, 1, 1));
        assert_eq!(p.parse_str("\"2024-01-02\""), ymd(2024, 1, 2));
    }

    #[test]
    fn garbage_is_null() {
        let p = parser();
        assert_eq!(p.parse_str(""), None);
        assert_eq!(p.parse_str("yesterday"), None);
        assert_eq!(p.parse_str("2024-13-45"), None);
        assert_eq!(p.parse_cell(&CellValue::Bool(true)), None);
        assert_eq!(p.parse_cell(&CellValue::Number(-3.0)), None);
    }

    #[test]
    fn serials_and_native_dates() {
        let p = parser();
        assert_eq!(p.parse_cell(&CellValue::Number(45292.0)), ymd(2024, 1, 1));
        assert_eq!(p.parse_cell(&CellValue::Number(45292.75)), ymd(2024, 1, 1));
        let native = ymd(2023, 6, 30).and_then(|d| d.and_hms_opt(8, 0, 0));
        assert_eq!(
            native.and_then(|dt| p.parse_cell(&CellValue::DateTime(dt))),
            ymd(2023, 6, 30)
        );
    }

    #[test]
    fn serial_conversion_keeps_time_of_day() {
        let dt = excel_serial_to_datetime(45292.5);
        assert_eq!(dt, ymd(2024, 1, 1).and_then(|d| d.and_hms_opt(12, 0, 0)));
        assert_eq!(excel_serial_to_datetime(f64::NAN), None);
    }
}
