use jsonschema::Validator;
use serde_json::{json, Value};

use crate::error::{Result, SchemaError};

/// Compiled JSON Schemas for textual command requests.
pub(crate) struct RequestValidator {
    message: Validator,
    addressed: Validator,
}

impl RequestValidator {
    pub(crate) fn new() -> Result<Self> {
        let message_schema = message_schema();
        let addressed_schema = json!({
            "type": "object",
            "properties": {
                "identifier": {
                    "type": "string",
                    "pattern": "^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$"
                },
                "message": message_schema.clone()
            },
            "required": ["identifier", "message"],
            "additionalProperties": false
        });

        Ok(Self {
            message: compile(&message_schema)?,
            addressed: compile(&addressed_schema)?,
        })
    }

    /// Check a bare `{type, subsystem, command, payload}` request.
    pub(crate) fn validate_message(&self, value: &Value) -> Result<()> {
        validate(&self.message, value)
    }

    /// Check an `{identifier, message}` request.
    pub(crate) fn validate_addressed(&self, value: &Value) -> Result<()> {
        validate(&self.addressed, value)
    }
}

fn message_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "originator": { "enum": ["Ap", "Nwp"] },
            "type": { "enum": ["SyncReq", "AsyncReq", "SyncRsp"] },
            "subsystem": { "type": ["string", "integer"] },
            "command": { "type": ["string", "integer"] },
            "payload": { "type": ["object", "array", "null"] }
        },
        "required": ["type", "subsystem", "command"],
        "additionalProperties": false
    })
}

fn compile(schema: &Value) -> Result<Validator> {
    jsonschema::validator_for(schema).map_err(|err| SchemaError::CompileFailed(err.to_string()))
}

fn validate(validator: &Validator, value: &Value) -> Result<()> {
    let mut errors = validator.iter_errors(value);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(3) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(SchemaError::ValidationFailed(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_request() {
        let validator = RequestValidator::new().unwrap();
        let request = json!({
            "type": "SyncReq",
            "subsystem": "RTLS",
            "command": "RTLS_CMD_AOA_ENABLE",
            "payload": { "enable": 1 }
        });
        assert!(validator.validate_message(&request).is_ok());
    }

    #[test]
    fn rejects_missing_command_and_extra_fields() {
        let validator = RequestValidator::new().unwrap();
        let missing = json!({ "type": "SyncReq", "subsystem": "RTLS" });
        let extra = json!({
            "type": "SyncReq",
            "subsystem": "RTLS",
            "command": "RTLS_CMD_SCAN",
            "bogus": true
        });
        assert!(matches!(
            validator.validate_message(&missing),
            Err(SchemaError::ValidationFailed(_))
        ));
        assert!(validator.validate_message(&extra).is_err());
    }

    #[test]
    fn addressed_request_needs_identifier() {
        let validator = RequestValidator::new().unwrap();
        let good = json!({
            "identifier": "AA:BB:CC:DD:EE:FF",
            "message": { "type": "SyncReq", "subsystem": "RTLS", "command": "RTLS_CMD_SCAN" }
        });
        let bad = json!({
            "identifier": "not-an-address",
            "message": { "type": "SyncReq", "subsystem": "RTLS", "command": "RTLS_CMD_SCAN" }
        });
        assert!(validator.validate_addressed(&good).is_ok());
        assert!(validator.validate_addressed(&bad).is_err());
    }
}
