//! Optional request log.
//!
//! The request logger is enabled with the `--request-log` command-line option, or the
//! [`LoadTestDefault::RequestLog`](../config/enum.LoadTestDefault.html#variant.RequestLog)
//! default. When enabled, a tokio task is launched and a channel is provided to every
//! [`VirtualUser`](../user/struct.VirtualUser.html) so each request can be sent to it for
//! efficient logging to file. The logger uses tokio's asynchronous
//! [`BufWriter`](https://docs.rs/tokio/*/tokio/io/struct.BufWriter.html), flushed when the
//! load test shuts down.
//!
//! Lines are written in the format set with `--request-format`:
//!  - `json` (default): one JSON object per request, for example
//!    `{"elapsed":1021,"method":"POST","name":"POST /vehicle/park","url":"http://localhost:8080/vehicle/park","response_time":3,"status_code":200,"success":true,"user":4,"error":""}`
//!  - `csv`: a header line, then one comma separated line per request
//!  - `raw`: the Debug output of each request

use serde_json::json;
use std::io;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::Configuration;
use crate::metrics::RequestMetric;
use crate::LoadTestError;

/// Optional unbounded sender to the request logger, `None` tells it to flush and exit.
pub(crate) type LoggerTx = Option<flume::Sender<Option<RequestMetric>>>;

/// Optional handle of the request logger task.
pub(crate) type LoggerHandle = Option<tokio::task::JoinHandle<io::Result<()>>>;

/// Supported request log formats.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Csv,
    Raw,
}
impl FromStr for LogFormat {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "csv" => Ok(LogFormat::Csv),
            "raw" => Ok(LogFormat::Raw),
            _ => Err(LoadTestError::InvalidOption {
                option: "--request-format".to_string(),
                value: s.to_string(),
                detail: "Invalid format, must be one of: json, csv, raw.".to_string(),
            }),
        }
    }
}

/// Header line written once at the top of csv request logs.
pub const CSV_HEADER: &str =
    "elapsed,method,name,url,response_time,status_code,success,user,error";

// Quote a csv field if needed.
fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Format a single request metric as one log line, without a trailing line feed.
pub(crate) fn format_request(format: &LogFormat, request: &RequestMetric) -> String {
    match format {
        LogFormat::Json => json!(request).to_string(),
        LogFormat::Csv => format!(
            "{},{},{},{},{},{},{},{},{}",
            request.elapsed,
            request.method,
            csv_field(&request.name),
            csv_field(&request.url),
            request.response_time,
            request.status_code,
            request.success,
            request.user,
            csv_field(&request.error),
        ),
        LogFormat::Raw => format!("{:?}", request),
    }
}

impl Configuration {
    /// Launch the request logger task if `--request-log` is configured.
    pub(crate) async fn setup_request_logger(
        &self,
    ) -> Result<(LoggerHandle, LoggerTx), LoadTestError> {
        if self.request_log.is_empty() {
            return Ok((None, None));
        }

        // Create the file before any user starts, so a bad path fails the load test early.
        let file = File::create(&self.request_log).await?;
        info!("writing requests to request_log: {}", &self.request_log);

        let (all_users_tx, logger_rx): (
            flume::Sender<Option<RequestMetric>>,
            flume::Receiver<Option<RequestMetric>>,
        ) = flume::unbounded();
        let format = self.request_format.clone().unwrap_or(LogFormat::Json);
        let path = self.request_log.clone();
        let handle = tokio::spawn(logger_main(
            path,
            format,
            BufWriter::with_capacity(64 * 1024, file),
            logger_rx,
        ));

        Ok((Some(handle), Some(all_users_tx)))
    }
}

/// Request logger task, writes each request received from
/// [`VirtualUser`](../user/struct.VirtualUser.html)s until told to exit.
async fn logger_main(
    path: String,
    format: LogFormat,
    mut file: BufWriter<File>,
    receiver: flume::Receiver<Option<RequestMetric>>,
) -> io::Result<()> {
    if format == LogFormat::Csv {
        file.write_all(format!("{}\n", CSV_HEADER).as_ref()).await?;
    }

    while let Ok(message) = receiver.recv_async().await {
        match message {
            Some(request) => {
                let formatted = format_request(&format, &request);
                if let Err(e) = file.write_all(format!("{}\n", formatted).as_ref()).await {
                    warn!("failed to write to {}: {}", &path, e);
                }
            }
            // Empty message means it's time to exit.
            None => break,
        }
    }

    info!("flushing request_log: {}", &path);
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RequestMetric {
        RequestMetric {
            elapsed: 1_021,
            method: "POST".to_string(),
            name: "POST /vehicle/park".to_string(),
            url: "http://localhost:8080/vehicle/park".to_string(),
            response_time: 3,
            status_code: 500,
            success: false,
            user: 4,
            error: "500 Internal Server Error".to_string(),
        }
    }

    #[test]
    fn parse_format() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("CSV".parse::<LogFormat>().unwrap(), LogFormat::Csv);
        assert_eq!("raw".parse::<LogFormat>().unwrap(), LogFormat::Raw);
        assert!("pretty".parse::<LogFormat>().is_err());
    }

    #[test]
    fn format_lines() {
        let json_line = format_request(&LogFormat::Json, &request());
        let value: serde_json::Value = serde_json::from_str(&json_line).unwrap();
        assert_eq!(value["name"], "POST /vehicle/park");
        assert_eq!(value["status_code"], 500);
        assert_eq!(value["success"], false);

        assert_eq!(
            format_request(&LogFormat::Csv, &request()),
            "1021,POST,POST /vehicle/park,http://localhost:8080/vehicle/park,3,500,false,4,500 Internal Server Error"
        );
        assert_eq!(CSV_HEADER.split(',').count(), 9);

        assert!(format_request(&LogFormat::Raw, &request()).starts_with("RequestMetric {"));
    }

    #[test]
    fn csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
