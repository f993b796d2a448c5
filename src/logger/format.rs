//! Access log line formats
//!
//! - `combined` (Apache/Nginx combined format)
//! - `common` (Common Log Format)
//! - `json` (one object per line)

use crate::engine::Request;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLogFormat {
    #[default]
    Combined,
    Common,
    Json,
}

/// One served request, captured before the handler consumes it
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    #[serde(serialize_with = "serialize_time")]
    pub time: chrono::DateTime<Local>,
    pub method: String,
    /// Path plus query, as received
    pub target: String,
    /// `HTTP/1.1`, `HTTP/2`, ...
    pub protocol: String,
    pub status: u16,
    pub body_bytes: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub request_time_us: u64,
}

fn serialize_time<S: serde::Serializer>(
    time: &chrono::DateTime<Local>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339())
}

impl AccessLogEntry {
    pub fn from_request(req: &Request) -> Self {
        Self {
            remote_addr: req.remote_ip.to_string(),
            time: Local::now(),
            method: req.method.clone(),
            target: req.target.clone(),
            protocol: req.protocol.to_string(),
            status: 0,
            body_bytes: 0,
            referer: req.header("Referer").map(str::to_string),
            user_agent: req.header("User-Agent").map(str::to_string),
            request_time_us: 0,
        }
    }

    /// Record the outcome
    #[must_use]
    pub fn finish(mut self, status: u16, body_bytes: u64, elapsed: Duration) -> Self {
        self.status = status;
        self.body_bytes = body_bytes;
        self.request_time_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self
    }

    pub fn format(&self, format: AccessLogFormat) -> String {
        match format {
            AccessLogFormat::Combined => format!(
                "{} \"{}\" \"{}\"",
                self.format_common(),
                self.referer.as_deref().unwrap_or("-"),
                self.user_agent.as_deref().unwrap_or("-"),
            ),
            AccessLogFormat::Common => self.format_common(),
            AccessLogFormat::Json => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{} {} {}\" {} {}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.target,
            self.protocol,
            self.status,
            self.body_bytes,
        )
    }
}
