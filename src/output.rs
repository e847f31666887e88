use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use crate::collect::CollectReport;
use crate::handler::DataResponse;

pub struct JsonOutput;

impl JsonOutput {
    /// Re-indents the response body; errors go to stderr.
    pub fn print_response(response: &DataResponse) -> io::Result<()> {
        let body: Value = serde_json::from_str(&response.content)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        if response.is_success() {
            Self::print_json(&body)
        } else {
            let json = serde_json::to_string_pretty(&body).map_err(io::Error::other)?;
            let mut stderr = io::stderr();
            stderr.write_all(json.as_bytes())?;
            stderr.write_all(b"\n")?;
            Ok(())
        }
    }

    pub fn print_collect(reports: &[CollectReport]) -> io::Result<()> {
        Self::print_json(reports)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
