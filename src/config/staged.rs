//! Static check declarations.

use crate::engine::result::CheckRequest;
use crate::probes::{ProbeArgs, ProbeError, ProbeId};
use crate::FwCheckError;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// One static check, as declared in the staged-actions file.
///
/// Every key besides the three named ones is passed to the probe. Scalar
/// values are accepted in any JSON type and handed over as strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StagedAction {
    pub expected_ver: String,
    pub func_name: String,
    pub name: String,
    #[serde(flatten)]
    pub params: IndexMap<String, Value>,
}

impl StagedAction {
    /// Resolve the declared probe name.
    pub fn probe_id(&self) -> Result<ProbeId, ProbeError> {
        self.func_name.parse()
    }

    /// Probe arguments as strings.
    ///
    /// Objects and arrays have no string form a probe could use and are
    /// rejected with the offending key.
    pub fn args(&self) -> Result<ProbeArgs, FwCheckError> {
        self.params
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => String::new(),
                    Value::Array(_) | Value::Object(_) => {
                        return Err(FwCheckError::Configuration(format!(
                            "staged action '{}': parameter '{}' must be a scalar, got {}",
                            self.name, key, value
                        )))
                    }
                };
                Ok((key.clone(), text))
            })
            .collect()
    }

    pub fn into_request(self) -> Result<CheckRequest, FwCheckError> {
        let args = self.args()?;
        Ok(CheckRequest {
            name: self.name,
            probe: self.func_name,
            args,
            expected_version: self.expected_ver,
        })
    }
}
