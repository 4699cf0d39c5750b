//! Uploaded record and its JSON rendering

use core::fmt::{self, Write};

use heapless::String;

use crate::pms::ParticulateReading;
use crate::watchdog::GasMeasurement;

/// Capacity of a rendered record; the longest possible rendering fits
pub const RECORD_JSON_CAPACITY: usize = 192;

pub type RecordJson = String<RECORD_JSON_CAPACITY>;

/// One sampling cycle's values; absent values render as `null`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Record {
    /// Temperature [°C]
    pub temp: Option<f32>,
    /// Relative humidity [%]
    pub hum: Option<f32>,
    /// CO₂ [ppm]
    pub co2: Option<u16>,
    pub pm1: Option<u16>,
    pub pm25: Option<u16>,
    pub pm10: Option<u16>,
}

impl Record {
    pub fn new(gas: Option<&GasMeasurement>, pm: Option<&ParticulateReading>) -> Self {
        Self {
            temp: gas.map(|g| g.temperature),
            hum: gas.map(|g| g.humidity),
            co2: gas.map(|g| g.co2_ppm),
            pm1: pm.map(|p| p.pm1_0),
            pm25: pm.map(|p| p.pm2_5),
            pm10: pm.map(|p| p.pm10),
        }
    }

    /// Compact JSON object, fields in a fixed order
    ///
    /// Floats get two decimals; non-finite floats become `null`.
    pub fn to_json(&self) -> Result<RecordJson, fmt::Error> {
        let mut out = RecordJson::new();
        out.write_str("{\"temp\":")?;
        write_float(&mut out, self.temp)?;
        out.write_str(",\"hum\":")?;
        write_float(&mut out, self.hum)?;
        out.write_str(",\"co2\":")?;
        write_int(&mut out, self.co2)?;
        out.write_str(",\"pm1\":")?;
        write_int(&mut out, self.pm1)?;
        out.write_str(",\"pm25\":")?;
        write_int(&mut out, self.pm25)?;
        out.write_str(",\"pm10\":")?;
        write_int(&mut out, self.pm10)?;
        out.write_char('}')?;
        Ok(out)
    }
}

fn write_float<W: Write>(out: &mut W, value: Option<f32>) -> fmt::Result {
    match value {
        Some(v) if v.is_finite() => write!(out, "{:.2}", v),
        _ => out.write_str("null"),
    }
}

fn write_int<W: Write>(out: &mut W, value: Option<u16>) -> fmt::Result {
    match value {
        Some(v) => write!(out, "{}", v),
        None => out.write_str("null"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_record() {
        let gas = GasMeasurement {
            co2_ppm: 612,
            temperature: 23.456,
            humidity: 48.1,
        };
        let pm = ParticulateReading::new(5, 9, 12);
        let json = Record::new(Some(&gas), Some(&pm)).to_json().unwrap();
        assert_eq!(
            json.as_str(),
            r#"{"temp":23.46,"hum":48.10,"co2":612,"pm1":5,"pm25":9,"pm10":12}"#
        );
    }

    #[test]
    fn test_missing_values_render_null() {
        let json = Record::default().to_json().unwrap();
        assert_eq!(
            json.as_str(),
            r#"{"temp":null,"hum":null,"co2":null,"pm1":null,"pm25":null,"pm10":null}"#
        );
    }

    #[test]
    fn test_non_finite_float_renders_null() {
        let record = Record {
            temp: Some(f32::NAN),
            hum: Some(f32::NEG_INFINITY),
            co2: Some(400),
            ..Record::default()
        };
        assert!(record
            .to_json()
            .unwrap()
            .starts_with(r#"{"temp":null,"hum":null,"co2":400,"#));
    }

    #[test]
    fn test_longest_record_fits() {
        let record = Record {
            temp: Some(-f32::MAX),
            hum: Some(-f32::MAX),
            co2: Some(u16::MAX),
            pm1: Some(u16::MAX),
            pm25: Some(u16::MAX),
            pm10: Some(u16::MAX),
        };
        assert!(record.to_json().is_ok());
    }
}
