use std::{collections::HashMap, fmt, str::FromStr};

use power_client::domain::Reading;

use crate::error::ValidationError;

/// Statistic used to reduce a window of readings to one power value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Average,
    Median,
    Mode,
    /// `percentileNN`, NN in `0..=100`.
    Percentile(u8),
    /// Mean of the 25th, 50th and 75th percentiles.
    Quartile,
    /// Population mean plus population standard deviation.
    StdDevMean,
}

impl FromStr for Method {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || ValidationError::UnsupportedMethod(s.to_string());
        match s {
            "average" => Ok(Self::Average),
            "median" => Ok(Self::Median),
            "mode" => Ok(Self::Mode),
            "quartile" => Ok(Self::Quartile),
            "stddev_mean" => Ok(Self::StdDevMean),
            other => {
                let digits = other.strip_prefix("percentile").ok_or_else(unsupported)?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(unsupported());
                }
                match digits.parse::<u8>() {
                    Ok(p) if p <= 100 => Ok(Self::Percentile(p)),
                    _ => Err(unsupported()),
                }
            }
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Average => f.write_str("average"),
            Self::Median => f.write_str("median"),
            Self::Mode => f.write_str("mode"),
            Self::Percentile(p) => write!(f, "percentile{p}"),
            Self::Quartile => f.write_str("quartile"),
            Self::StdDevMean => f.write_str("stddev_mean"),
        }
    }
}

/// Representative power of a window. An empty window yields `0.0`, which the
/// sizing step treats as "no data".
pub fn estimate(readings: &[Reading], method: Method) -> f64 {
    let powers: Vec<f64> = readings.iter().map(|r| r.power).collect();
    estimate_values(&powers, method)
}

pub fn estimate_values(values: &[f64], method: Method) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match method {
        Method::Average => average(values),
        Method::Median => median(values),
        Method::Mode => mode(values),
        Method::Percentile(p) => percentile(values, f64::from(p)),
        Method::Quartile => quartile(values),
        Method::StdDevMean => stddev_mean(values),
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let v = sorted(values);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}

/// Most frequent value. On a tie the value that reached the winning count
/// first, scanning left to right, is returned.
pub fn mode(values: &[f64]) -> f64 {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    let mut best = (0.0, 0usize);
    for &v in values {
        // Normalise -0.0 so it counts with 0.0.
        let count = counts.entry((v + 0.0).to_bits()).or_insert(0);
        *count += 1;
        if *count > best.1 {
            best = (v, *count);
        }
    }
    best.0
}

/// Linear-interpolated percentile. `p` is clamped to `[0, 100]`.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    percentile_of_sorted(&sorted(values), p)
}

fn percentile_of_sorted(v: &[f64], p: f64) -> f64 {
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let idx = p / 100.0 * (v.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    if lower == upper {
        v[lower]
    } else {
        v[lower] + (v[upper] - v[lower]) * (idx - lower as f64)
    }
}

pub fn quartile(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let v = sorted(values);
    (percentile_of_sorted(&v, 25.0) + percentile_of_sorted(&v, 50.0) + percentile_of_sorted(&v, 75.0)) / 3.0
}

pub fn stddev_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = average(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    mean + variance.sqrt()
}
