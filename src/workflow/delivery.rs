//! Identity lookup and file delivery over HTTP.
//!
//! Both endpoints are `POST`s answering JSON. The lookup endpoint takes
//! `?id=<identity number>` and answers `{returnCode, returnData,
//! returnMessage}`; the delivery endpoint takes `?target=<account>` with a
//! multipart `file` body and answers `{code, message}`. A code of `1` means
//! success in both.

use super::config::DeliveryConfig;
use super::Messenger;
use crate::error::{Error, Result};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(rename = "returnCode", default)]
    return_code: Value,
    #[serde(rename = "returnData", default)]
    return_data: Value,
    #[serde(rename = "returnMessage", default)]
    return_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeliveryResponse {
    #[serde(default)]
    code: Value,
    #[serde(default)]
    message: Option<String>,
}

/// `1` as a number or a string.
fn is_success(code: &Value) -> bool {
    match code {
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

/// Interpret a lookup answer as an account identifier.
fn parse_lookup(body: &str) -> Result<String> {
    let response: LookupResponse = serde_json::from_str(body)?;
    if !is_success(&response.return_code) {
        return Err(Error::Service(format!(
            "lookup failed ({}): {}",
            response.return_code,
            response.return_message.unwrap_or_default()
        )));
    }
    let account = match response.return_data {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    if account.trim().is_empty() {
        return Err(Error::Service("lookup returned no account".to_string()));
    }
    Ok(account.trim().to_string())
}

/// Interpret a delivery answer.
fn parse_delivery(body: &str) -> Result<()> {
    let response: DeliveryResponse = serde_json::from_str(body)?;
    if is_success(&response.code) {
        Ok(())
    } else {
        Err(Error::Service(format!(
            "delivery failed ({}): {}",
            response.code,
            response.message.unwrap_or_default()
        )))
    }
}

/// Blocking HTTP client for the lookup and delivery endpoints.
pub struct HttpMessenger {
    client: Client,
    config: DeliveryConfig,
}

impl HttpMessenger {
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Http(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Send a request, retrying transport failures and 5xx answers.
    fn send_with_retry(&self, what: &str, build: impl Fn() -> Result<RequestBuilder>) -> Result<String> {
        let max_retries = self.config.max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match build()?.send() {
                Ok(response) if response.status().is_server_error() => {
                    format!("HTTP {}", response.status())
                }
                Ok(response) => return read_body(what, response),
                Err(e) => e.to_string(),
            };
            if attempt >= max_retries {
                return Err(Error::Http(format!(
                    "{} failed after {} attempts: {}",
                    what, attempt, failure
                )));
            }
            warn!("{} attempt {} failed: {}, retrying...", what, attempt, failure);
            std::thread::sleep(Duration::from_millis(
                self.config.retry_delay_ms * attempt as u64,
            ));
        }
    }
}

fn read_body(what: &str, response: Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Http(format!("{}: HTTP {}", what, status)));
    }
    Ok(response.text()?)
}

impl Messenger for HttpMessenger {
    fn lookup_id(&self, id_number: &str) -> Result<String> {
        debug!(url = %self.config.lookup_url, "looking up account");
        let body = self.send_with_retry("lookup", || {
            Ok(self
                .client
                .post(&self.config.lookup_url)
                .query(&[("id", id_number)]))
        })?;
        parse_lookup(&body)
    }

    fn deliver_file(&self, account: &str, data: &[u8], file_name: &str) -> Result<()> {
        let body = self.send_with_retry("delivery", || {
            let part = multipart::Part::bytes(data.to_vec())
                .file_name(file_name.to_string())
                .mime_str(mime_for(file_name))?;
            Ok(self
                .client
                .post(&self.config.delivery_url)
                .query(&[("target", account)])
                .multipart(multipart::Form::new().part("file", part)))
        })?;
        parse_delivery(&body)?;
        info!(file = file_name, "delivered");
        Ok(())
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".pptx") {
        "application/vnd.openxmlformats-officedocument.presentationml.presentation"
    } else {
        "application/octet-stream"
    }
}
