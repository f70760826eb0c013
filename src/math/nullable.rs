//! serde_json writes `NaN` and infinities as `null`; these read `null` back as
//! `NaN` so a saved results file always loads.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

pub fn f64_or_nan<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
}

pub fn dated_f64_or_nan<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<(NaiveDate, f64)>, D::Error> {
    let raw = Vec::<(NaiveDate, Option<f64>)>::deserialize(d)?;
    Ok(raw
        .into_iter()
        .map(|(date, v)| (date, v.unwrap_or(f64::NAN)))
        .collect())
}
