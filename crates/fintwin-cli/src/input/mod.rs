pub mod file;
pub mod stdin;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Input from `--input <file>` or, failing that, piped stdin.
pub fn read_value(path: Option<&str>, what: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(p) = path {
        file::read_value(p)
    } else if let Some(data) = stdin::read_stdin()? {
        Ok(data)
    } else {
        Err(format!("--input <file.json|file.yaml> or stdin required for {what}").into())
    }
}

pub fn read<T: DeserializeOwned>(path: Option<&str>, what: &str) -> Result<T, Box<dyn std::error::Error>> {
    let value = read_value(path, what)?;
    Ok(serde_json::from_value(value)?)
}

/// Set `key` under the object at `parents` to `date` unless already present.
/// Missing parent objects are created.
pub fn default_date(value: &mut Value, parents: &[&str], key: &str, date: NaiveDate) {
    let mut cursor = value;
    for p in parents {
        let Value::Object(map) = cursor else {
            return;
        };
        cursor = map
            .entry(p.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if let Value::Object(map) = cursor {
        map.entry(key.to_string())
            .or_insert_with(|| Value::String(date.to_string()));
    }
}
