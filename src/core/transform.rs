use crate::core::fetch::json_kind;
use crate::domain::model::{FlatRow, RunContext, SourcePayload};
use crate::utils::error::{EtlError, Result};
use serde_json::{Map, Value};

/// 取出 `results[0]`，results 不存在、不是陣列或為空都直接失敗
pub fn first_result(payload: &SourcePayload) -> Result<&Map<String, Value>> {
    let results = payload
        .get("results")
        .ok_or_else(|| EtlError::MissingFieldError {
            path: "results".to_string(),
        })?;

    let items = results
        .as_array()
        .ok_or_else(|| EtlError::MalformedFieldError {
            path: "results".to_string(),
            found: json_kind(results).to_string(),
        })?;

    let first = items.first().ok_or(EtlError::EmptyResultSet)?;

    first.as_object().ok_or_else(|| EtlError::MalformedFieldError {
        path: "results[0]".to_string(),
        found: json_kind(first).to_string(),
    })
}

/// 以點號路徑查字串欄位，例如 `name.first`
pub fn lookup_str(record: &Map<String, Value>, path: &str) -> Result<String> {
    let mut segments = path.split('.');
    let head = segments.next().unwrap_or_default();
    let mut current = record.get(head).ok_or_else(|| EtlError::MissingFieldError {
        path: path.to_string(),
    })?;

    for segment in segments {
        current = current
            .as_object()
            .and_then(|obj| obj.get(segment))
            .ok_or_else(|| EtlError::MissingFieldError {
                path: path.to_string(),
            })?;
    }

    current
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EtlError::MalformedFieldError {
            path: path.to_string(),
            found: json_kind(current).to_string(),
        })
}

pub fn flatten_user(payload: &SourcePayload) -> Result<FlatRow> {
    let user = first_result(payload)?;

    Ok(FlatRow {
        firstname: lookup_str(user, "name.first")?,
        lastname: lookup_str(user, "name.last")?,
        country: lookup_str(user, "location.country")?,
        username: lookup_str(user, "login.username")?,
        password: lookup_str(user, "login.password")?,
        email: lookup_str(user, "email")?,
    })
}

/// 逗號分隔、無標題列、無索引欄
pub fn encode_row(row: &FlatRow) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.serialize(row)?;
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

/// 暫存檔名模板替換
pub fn render_staging_key(template: &str, run: &RunContext, dag_id: &str) -> String {
    template
        .replace("{run_id}", &run.slug())
        .replace("{dag_id}", dag_id)
}
