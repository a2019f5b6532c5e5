use crate::error::RenumberError;
use crate::renumber::renumber_json;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn wasm_init() {
    console_error_panic_hook::set_once();
}

#[wasm_bindgen]
pub struct WasmRenumberResult {
    records_json: String,
    mapping_json: String,
    report_json: String,
    average_before: f64,
    average_after: f64,
}

#[wasm_bindgen]
impl WasmRenumberResult {
    #[wasm_bindgen(getter)]
    pub fn records(&self) -> String {
        self.records_json.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn mapping(&self) -> String {
        self.mapping_json.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn report(&self) -> String {
        self.report_json.clone()
    }

    #[wasm_bindgen(getter, js_name = "averageBefore")]
    pub fn average_before(&self) -> f64 {
        self.average_before
    }

    #[wasm_bindgen(getter, js_name = "averageAfter")]
    pub fn average_after(&self) -> f64 {
        self.average_after
    }
}

fn js_error(e: RenumberError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| js_error(e.into()))
}

#[wasm_bindgen]
pub fn renumber_wasm(
    records_json: &str,
    config_json: Option<String>,
) -> Result<WasmRenumberResult, JsValue> {
    let outcome = renumber_json(records_json, config_json.as_deref()).map_err(js_error)?;

    Ok(WasmRenumberResult {
        records_json: to_json(&outcome.records)?,
        mapping_json: to_json(&outcome.mapping)?,
        report_json: to_json(&outcome.report)?,
        average_before: outcome.stats.before.average,
        average_after: outcome.stats.after.average,
    })
}

/// Whole outcome as one JSON document.
#[wasm_bindgen]
pub fn renumber_simple(records_json: &str, config_json: Option<String>) -> Result<String, JsValue> {
    let outcome = renumber_json(records_json, config_json.as_deref()).map_err(js_error)?;
    to_json(&outcome)
}

#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
