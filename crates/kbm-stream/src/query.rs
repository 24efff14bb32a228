use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{StreamError, StreamResult};

/// Templates shipped with the binary, used when no file overrides them.
const BUILTIN: &[(&str, &str)] = &[("dupes", "haswbstatement:{instance_of}={dupes}")];

/// Loads search queries from named templates.
///
/// Templates are looked up as `<dir>/<name>.txt` first, then among the
/// built-in templates. Placeholders are written `{param}`; `{{` and `}}`
/// produce literal braces.
#[derive(Clone, Debug, Default)]
pub struct QueryStore {
    dir: Option<PathBuf>,
}

impl QueryStore {
    /// A store with only the built-in templates.
    pub fn new() -> Self {
        Self { dir: None }
    }

    /// A store that prefers templates from `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Raw template text for `name`.
    pub fn get_query(&self, name: &str) -> StreamResult<String> {
        if let Some(dir) = &self.dir {
            match fs::read_to_string(dir.join(format!("{name}.txt"))) {
                Ok(text) => return Ok(text.trim().to_string()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        BUILTIN
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, text)| text.to_string())
            .ok_or_else(|| StreamError::UnknownQuery(name.to_string()))
    }

    /// Render template `name` with the given parameters.
    pub fn build_query(&self, name: &str, params: &[(&str, String)]) -> StreamResult<String> {
        let template = self.get_query(name)?;
        render(name, &template, params)
    }
}

fn render(name: &str, template: &str, params: &[(&str, String)]) -> StreamResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            let end = tail
                .find('}')
                .ok_or_else(|| StreamError::MalformedTemplate(name.to_string()))?;
            let key = &tail[1..end];
            let value = params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .ok_or_else(|| StreamError::MissingParam {
                    query: name.to_string(),
                    param: key.to_string(),
                })?;
            out.push_str(value);
            rest = &tail[end + 1..];
        } else {
            return Err(StreamError::MalformedTemplate(name.to_string()));
        }
    }
    out.push_str(rest);
    Ok(out)
}
