use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DeviceFault, ProtocolError, Result};

const MISSING_MESSAGE: &str = "error message missing";

/// Reply field-naming convention spoken by a firmware family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `{"method_id": .., "status": .., <fields>, "error_message"?: ..}`
    StatusCode,
    /// `{"id": .., "result"?: .., "error"?: {"message", "data", "code"}}`
    ResultError,
}

/// Response-code table reported by status-code firmware.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCodes {
    success: i64,
    names: HashMap<i64, String>,
}

impl StatusCodes {
    /// Table that only knows its success code
    pub fn new(success: i64) -> Self {
        Self {
            success,
            names: HashMap::new(),
        }
    }

    /// Build from a discovery payload mapping code name to integer code.
    ///
    /// The success code is the entry called `success_name`; when the device
    /// does not list one, `fallback_success` stays in effect.
    pub fn from_payload(payload: &Value, success_name: &str, fallback_success: i64) -> Result<Self> {
        let entries = payload.as_object().ok_or_else(|| {
            ProtocolError::MalformedResponse(format!(
                "response-code table is not an object: {}",
                payload
            ))
        })?;

        let mut codes = Self::new(fallback_success);
        for (name, code) in entries {
            let code = code.as_i64().ok_or_else(|| {
                ProtocolError::MalformedResponse(format!(
                    "response code {:?} is not an integer: {}",
                    name, code
                ))
            })?;
            if name == success_name {
                codes.success = code;
            }
            codes.names.insert(code, name.clone());
        }
        Ok(codes)
    }

    pub fn success(&self) -> i64 {
        self.success
    }

    pub fn name_of(&self, code: i64) -> Option<&str> {
        self.names.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for StatusCodes {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Matches a decoded reply to the request that produced it.
#[derive(Debug, Clone)]
pub struct Correlator {
    dialect: Dialect,
    codes: StatusCodes,
}

impl Correlator {
    pub fn new(dialect: Dialect, codes: StatusCodes) -> Self {
        Self { dialect, codes }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn codes(&self) -> &StatusCodes {
        &self.codes
    }

    pub fn set_codes(&mut self, codes: StatusCodes) {
        self.codes = codes;
    }

    /// Validate `response` against the request id `sent` and extract the
    /// success payload, or classify the failure.
    pub fn correlate(&self, sent: u16, response: Map<String, Value>) -> Result<Value> {
        match self.dialect {
            Dialect::StatusCode => self.correlate_status_code(sent, response),
            Dialect::ResultError => correlate_result_error(sent, response),
        }
    }

    fn correlate_status_code(&self, sent: u16, mut response: Map<String, Value>) -> Result<Value> {
        let echoed = response.remove("method_id").ok_or(ProtocolError::MissingEchoedId)?;
        let status = response.remove("status").ok_or(ProtocolError::MissingStatus)?;
        check_echo(sent, echoed)?;

        let status = status.as_i64().ok_or_else(|| {
            ProtocolError::MalformedResponse(format!("status is not an integer: {}", status))
        })?;

        if status != self.codes.success() {
            return Err(status_fault(&self.codes, status, &response));
        }

        Ok(Value::Object(response))
    }

    /// Correlate the reply carrying the response-code table.
    ///
    /// Its status is judged against the success entry of the table it
    /// delivers, since the device's success code is unknown until then.
    pub fn correlate_status_codes(
        &self,
        sent: u16,
        mut response: Map<String, Value>,
        success_name: &str,
        fallback_success: i64,
    ) -> Result<StatusCodes> {
        let echoed = response.remove("method_id").ok_or(ProtocolError::MissingEchoedId)?;
        let status = response.remove("status").ok_or(ProtocolError::MissingStatus)?;
        check_echo(sent, echoed)?;

        let status = status.as_i64().ok_or_else(|| {
            ProtocolError::MalformedResponse(format!("status is not an integer: {}", status))
        })?;

        let mut entries = response.clone();
        entries.remove("error_message");
        let codes = StatusCodes::from_payload(&Value::Object(entries), success_name, fallback_success)?;

        if status != codes.success() {
            return Err(status_fault(&codes, status, &response));
        }
        Ok(codes)
    }
}

fn status_fault(codes: &StatusCodes, status: i64, response: &Map<String, Value>) -> ProtocolError {
    let message = match response.get("error_message") {
        Some(Value::String(message)) => message.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => MISSING_MESSAGE.to_string(),
    };
    ProtocolError::DeviceError(DeviceFault {
        tag: codes.name_of(status).map(str::to_string),
        message,
        code: Value::from(status),
        data: Value::Null,
    })
}

fn correlate_result_error(sent: u16, mut response: Map<String, Value>) -> Result<Value> {
    let echoed = response.remove("id").ok_or(ProtocolError::MissingEchoedId)?;
    check_echo(sent, echoed)?;

    match response.remove("error") {
        None | Some(Value::Null) => {}
        Some(error) => return Err(ProtocolError::DeviceError(fault_from_error(error))),
    }

    response.remove("result").ok_or(ProtocolError::MissingResult)
}

fn check_echo(sent: u16, echoed: Value) -> Result<()> {
    if echoed.as_u64() == Some(u64::from(sent)) {
        Ok(())
    } else {
        Err(ProtocolError::IdMismatch {
            sent,
            received: echoed,
        })
    }
}

fn fault_from_error(error: Value) -> DeviceFault {
    match error {
        Value::Object(mut fields) => {
            let message = match fields.remove("message") {
                Some(Value::String(message)) => message,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            DeviceFault {
                tag: None,
                message,
                code: fields.remove("code").unwrap_or(Value::Null),
                data: fields.remove("data").unwrap_or(Value::Null),
            }
        }
        Value::String(message) => DeviceFault {
            tag: None,
            message,
            code: Value::Null,
            data: Value::Null,
        },
        other => DeviceFault {
            tag: None,
            message: other.to_string(),
            code: Value::Null,
            data: Value::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_response;
    use serde_json::json;

    fn status_code() -> Correlator {
        Correlator::new(Dialect::StatusCode, StatusCodes::new(0))
    }

    fn result_error() -> Correlator {
        Correlator::new(Dialect::ResultError, StatusCodes::default())
    }

    fn correlate(correlator: &Correlator, sent: u16, line: &str) -> Result<Value> {
        correlator.correlate(sent, decode_response(line).unwrap())
    }

    #[test]
    fn test_status_code_success_strips_protocol_fields() {
        let payload = correlate(
            &status_code(),
            4,
            r#"{"method_id": 4, "status": 0, "temperature": 21.5}"#,
        )
        .unwrap();
        assert_eq!(payload, json!({"temperature": 21.5}));
    }

    #[test]
    fn test_status_code_missing_fields() {
        let correlator = status_code();
        assert!(matches!(
            correlate(&correlator, 4, r#"{"status": 0}"#),
            Err(ProtocolError::MissingEchoedId)
        ));
        assert!(matches!(
            correlate(&correlator, 4, r#"{"method_id": 4}"#),
            Err(ProtocolError::MissingStatus)
        ));
    }

    #[test]
    fn test_status_code_id_mismatch() {
        match correlate(&status_code(), 4, r#"{"method_id": 5, "status": 0}"#) {
            Err(ProtocolError::IdMismatch { sent, received }) => {
                assert_eq!(sent, 4);
                assert_eq!(received, json!(5));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_status_code_device_error() {
        let mut names = json!({"SUCCESS": 0, "BAD_ARGUMENT": 3});
        let codes = StatusCodes::from_payload(&names, "SUCCESS", 0).unwrap();
        let correlator = Correlator::new(Dialect::StatusCode, codes);

        match correlate(
            &correlator,
            2,
            r#"{"method_id": 2, "status": 3, "error_message": "pin out of range"}"#,
        ) {
            Err(ProtocolError::DeviceError(fault)) => {
                assert_eq!(fault.tag.as_deref(), Some("BAD_ARGUMENT"));
                assert_eq!(fault.message, "pin out of range");
                assert_eq!(fault.code, json!(3));
            }
            other => panic!("unexpected: {other:?}"),
        }

        names["SUCCESS"] = json!(1);
        let codes = StatusCodes::from_payload(&names, "SUCCESS", 0).unwrap();
        let correlator = Correlator::new(Dialect::StatusCode, codes);
        match correlate(&correlator, 2, r#"{"method_id": 2, "status": 0}"#) {
            Err(ProtocolError::DeviceError(fault)) => {
                assert_eq!(fault.tag, None);
                assert_eq!(fault.message, MISSING_MESSAGE);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_result_error_success() {
        let payload = correlate(&result_error(), 3, r#"{"id": 3, "result": [1, 2]}"#).unwrap();
        assert_eq!(payload, json!([1, 2]));

        let payload = correlate(&result_error(), 3, r#"{"id": 3, "result": null}"#).unwrap();
        assert_eq!(payload, Value::Null);
    }

    #[test]
    fn test_result_error_missing_fields() {
        let correlator = result_error();
        assert!(matches!(
            correlate(&correlator, 3, r#"{"result": 1}"#),
            Err(ProtocolError::MissingEchoedId)
        ));
        assert!(matches!(
            correlate(&correlator, 3, r#"{"id": 3}"#),
            Err(ProtocolError::MissingResult)
        ));
        assert!(matches!(
            correlate(&correlator, 3, r#"{"id": "3", "result": 1}"#),
            Err(ProtocolError::IdMismatch { sent: 3, .. })
        ));
    }

    #[test]
    fn test_result_error_device_error() {
        let line = r#"{"id": 8, "error": {"message": "busy", "code": -32000, "data": {"retry_ms": 50}}}"#;
        match correlate(&result_error(), 8, line) {
            Err(ProtocolError::DeviceError(fault)) => {
                assert_eq!(fault.message, "busy");
                assert_eq!(fault.code, json!(-32000));
                assert_eq!(fault.data, json!({"retry_ms": 50}));
            }
            other => panic!("unexpected: {other:?}"),
        }

        match correlate(&result_error(), 8, r#"{"id": 8, "error": {}}"#) {
            Err(ProtocolError::DeviceError(fault)) => {
                assert_eq!(fault.message, "");
                assert!(fault.code.is_null());
                assert!(fault.data.is_null());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_result_error_null_error_is_success() {
        let payload = correlate(&result_error(), 1, r#"{"id": 1, "error": null, "result": 7}"#).unwrap();
        assert_eq!(payload, json!(7));
    }

    #[test]
    fn test_id_mismatch_checked_before_error() {
        assert!(matches!(
            correlate(&result_error(), 1, r#"{"id": 2, "error": {"message": "x"}}"#),
            Err(ProtocolError::IdMismatch { sent: 1, .. })
        ));
    }

    #[test]
    fn test_status_code_table_judged_by_its_own_success_entry() {
        let response = decode_response(r#"{"method_id": 2, "status": 1, "ERROR": 0, "SUCCESS": 1}"#).unwrap();
        let codes = status_code()
            .correlate_status_codes(2, response, "SUCCESS", 0)
            .unwrap();
        assert_eq!(codes.success(), 1);
        assert_eq!(codes.name_of(0), Some("ERROR"));

        let response = decode_response(
            r#"{"method_id": 2, "status": 0, "ERROR": 0, "SUCCESS": 1, "error_message": "not ready"}"#,
        )
        .unwrap();
        match status_code().correlate_status_codes(2, response, "SUCCESS", 0) {
            Err(ProtocolError::DeviceError(fault)) => {
                assert_eq!(fault.tag.as_deref(), Some("ERROR"));
                assert_eq!(fault.message, "not ready");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let response = decode_response(r#"{"method_id": 3, "status": 0, "SUCCESS": 0}"#).unwrap();
        assert!(matches!(
            status_code().correlate_status_codes(2, response, "SUCCESS", 0),
            Err(ProtocolError::IdMismatch { sent: 2, .. })
        ));
    }

    #[test]
    fn test_status_codes_reject_non_integer() {
        let result = StatusCodes::from_payload(&json!({"SUCCESS": "zero"}), "SUCCESS", 0);
        assert!(matches!(result, Err(ProtocolError::MalformedResponse(_))));
        let result = StatusCodes::from_payload(&json!([0]), "SUCCESS", 0);
        assert!(matches!(result, Err(ProtocolError::MalformedResponse(_))));
    }
}
