//! Error types for platform calls

use serde::Deserialize;

/// Transport-level failure: the request did not produce an HTTP response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl TransportError {
    /// Connection resets, DNS hiccups and timeouts are worth another try
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Connect(_) | TransportError::Timeout)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Structured error body returned by the platform
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlatformError {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default, rename = "innerError")]
    pub inner_error: Option<InnerError>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerError {
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub allowed_pattern: Option<String>,
    #[serde(default)]
    pub range_minimum_value: Option<f64>,
    #[serde(default)]
    pub range_maximum_value: Option<f64>,
    #[serde(default)]
    pub maximum_value: Option<f64>,
    #[serde(default)]
    pub referenced_values: Option<Vec<String>>,
}

impl PlatformError {
    /// Parse an error body; None when it is not a platform error document
    pub fn parse(body: &str) -> Option<Self> {
        let error: PlatformError = serde_json::from_str(body).ok()?;
        if error.code.is_none() && error.message.is_none() {
            return None;
        }
        Some(error)
    }

    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or("")
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    pub fn first_detail(&self) -> Option<&ErrorDetail> {
        self.details.first()
    }

    /// Multi-line rendering used as diagnostic detail
    pub fn render(&self) -> String {
        let mut out = String::from("PingOne Error Details:\n");
        out.push_str(&format!("ID:\t\t{}\n", self.id.as_deref().unwrap_or("")));
        out.push_str(&format!("Code:\t\t{}\n", self.code()));
        out.push_str(&format!("Message:\t{}\n", self.message()));

        if !self.details.is_empty() {
            out.push_str("Details:\n");
        }
        for detail in &self.details {
            out.push_str(&format!(
                "  - Code:\t{}\n",
                detail.code.as_deref().unwrap_or("")
            ));
            out.push_str(&format!(
                "    Message:\t{}\n",
                detail.message.as_deref().unwrap_or("")
            ));
            if let Some(ref target) = detail.target {
                out.push_str(&format!("    Target:\t{}\n", target));
            }
            if let Some(ref inner) = detail.inner_error {
                inner.render_into(&mut out);
            }
        }
        out
    }
}

impl InnerError {
    fn render_into(&self, out: &mut String) {
        if let Some(min) = self.range_minimum_value {
            out.push_str(&format!("    Range Min:\t{}\n", min));
        }
        if let Some(max) = self.range_maximum_value {
            out.push_str(&format!("    Range Max:\t{}\n", max));
        }
        if let Some(ref pattern) = self.allowed_pattern {
            out.push_str(&format!("    Allowed Pattern:\t{}\n", pattern));
        }
        if let Some(ref values) = self.allowed_values {
            out.push_str(&format!("    Allowed Values:\t{}\n", values.join(", ")));
        }
        if let Some(max) = self.maximum_value {
            out.push_str(&format!("    Max Value:\t{}\n", max));
        }
        if let Some(ref values) = self.referenced_values {
            out.push_str(&format!("    Referenced Values:\t{}\n", values.join(", ")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_region_detail() {
        let body = r#"{
            "id": "e1",
            "code": "INVALID_DATA",
            "message": "The request could not be completed.",
            "details": [{
                "code": "INVALID_VALUE",
                "target": "region",
                "message": "Region not allowed",
                "innerError": {"allowedValues": ["NA"]}
            }]
        }"#;
        let error = PlatformError::parse(body).unwrap();
        let detail = error.first_detail().unwrap();
        assert_eq!(detail.target.as_deref(), Some("region"));
        assert_eq!(
            detail.inner_error.as_ref().unwrap().allowed_values,
            Some(vec!["NA".to_string()])
        );
        assert!(error.render().contains("Allowed Values:\tNA"));
    }

    #[test]
    fn non_error_documents_are_rejected() {
        assert!(PlatformError::parse("<html>bad gateway</html>").is_none());
        assert!(PlatformError::parse(r#"{"name": "env"}"#).is_none());
    }

    #[test]
    fn transient_transport_errors() {
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::Connect("reset".to_string()).is_transient());
        assert!(!TransportError::Request("bad url".to_string()).is_transient());
    }
}
