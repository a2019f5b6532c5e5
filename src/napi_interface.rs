use napi::bindgen_prelude::*;
use napi_derive::napi;

use crate::error::RenumberError;
use crate::renumber::renumber_json;
use crate::types::RenumberOutcome;

#[napi(object)]
pub struct NapiRenumberResult {
    pub records_json: String,
    pub mapping_json: String,
    pub report_json: String,
    pub average_before: f64,
    pub average_after: f64,
}

fn napi_error(e: RenumberError) -> Error {
    let status = if e.is_structural() {
        Status::GenericFailure
    } else {
        Status::InvalidArg
    };
    Error::new(status, e.to_string())
}

fn serialize<T: serde::Serialize>(what: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        Error::new(
            Status::GenericFailure,
            format!("Failed to serialize {}: {}", what, RenumberError::from(e)),
        )
    })
}

fn run(records_json: &str, config_json: Option<String>) -> Result<RenumberOutcome> {
    renumber_json(records_json, config_json.as_deref()).map_err(napi_error)
}

#[napi(js_name = "renumber")]
pub fn renumber_napi(records_json: String, config_json: Option<String>) -> Result<NapiRenumberResult> {
    let outcome = run(&records_json, config_json)?;

    Ok(NapiRenumberResult {
        records_json: serialize("records", &outcome.records)?,
        mapping_json: serialize("mapping", &outcome.mapping)?,
        report_json: serialize("report", &outcome.report)?,
        average_before: outcome.stats.before.average,
        average_after: outcome.stats.after.average,
    })
}

#[napi]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[napi(js_name = "renumberSimple")]
pub fn renumber_simple(records_json: String, config_json: Option<String>) -> Result<String> {
    let outcome = run(&records_json, config_json)?;
    serialize("outcome", &outcome)
}
