use clap::Parser;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use crate::remote::{DEFAULT_API_VERSION, DEFAULT_ENDPOINT};
use crate::util::http::{InvalidUriError, Uri};
use crate::util::types::DeviceId;

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

fn parse_endpoint(s: &str) -> Result<Uri, InvalidUriError> {
    Uri::from_host_or_uri(s)
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Identifier of the device to provision
    #[arg(env = "DPS_DEVICE_ID", long = "device-id", value_name = "id")]
    pub device_id: DeviceId,

    /// ID scope of the provisioning service enrollment
    #[arg(env = "DPS_ID_SCOPE", long = "id-scope", value_name = "scope")]
    pub id_scope: String,

    /// Base64 encoded group primary key of the enrollment group
    #[arg(
        env = "DPS_GROUP_KEY",
        long = "group-key",
        value_name = "key",
        hide_env_values = true,
        conflicts_with = "group_key_file",
        required_unless_present = "group_key_file"
    )]
    pub group_key: Option<String>,

    /// File holding the base64 encoded group primary key
    #[arg(env = "DPS_GROUP_KEY_FILE", long = "group-key-file", value_name = "path")]
    pub group_key_file: Option<PathBuf>,

    /// Provisioning service endpoint, either a URI or a bare host name
    #[arg(
        env = "DPS_ENDPOINT",
        long = "dps-endpoint",
        value_name = "uri",
        value_parser = parse_endpoint,
        default_value = DEFAULT_ENDPOINT
    )]
    pub dps_endpoint: Uri,

    /// Provisioning service API version
    #[arg(
        env = "DPS_API_VERSION",
        long = "dps-api-version",
        value_name = "version",
        default_value = DEFAULT_API_VERSION
    )]
    pub dps_api_version: String,

    /// Gateway the device is attached to
    #[arg(env = "DPS_GATEWAY_ID", long = "gateway-id", value_name = "id")]
    pub gateway_id: Option<String>,

    /// Host name of the edge gateway the device connects through
    #[arg(
        env = "DPS_GATEWAY_HOST_NAME",
        long = "gateway-host-name",
        value_name = "host"
    )]
    pub gateway_host_name: Option<String>,

    /// Provisioning request timeout in milliseconds
    #[arg(
        env = "DPS_REQUEST_TIMEOUT_MS",
        long = "request-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub request_timeout: Option<Duration>,
}

pub fn parse() -> Cli {
    Parser::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from([
            "dps",
            "--device-id",
            "sensor-01",
            "--id-scope",
            "0ne000ABCDE",
            "--group-key",
            "a2V5",
        ])
        .unwrap();

        assert_eq!(cli.dps_endpoint.host(), Some("global.azure-devices-provisioning.net"));
        assert_eq!(cli.dps_api_version, DEFAULT_API_VERSION);
        assert!(cli.request_timeout.is_none());
    }

    #[test]
    fn test_group_key_is_required() {
        assert!(
            Cli::try_parse_from([
                "dps",
                "--device-id",
                "sensor-01",
                "--id-scope",
                "0ne000ABCDE",
                "--group-key",
                "a2V5",
                "--group-key-file",
                "/tmp/key",
            ])
            .is_err()
        );
        assert!(
            Cli::try_parse_from(["dps", "--device-id", "sensor-01", "--id-scope", "0ne000ABCDE"])
                .is_err()
        );
    }

    #[test]
    fn test_bare_host_endpoint() {
        let cli = Cli::try_parse_from([
            "dps",
            "--device-id",
            "sensor-01",
            "--id-scope",
            "0ne000ABCDE",
            "--group-key-file",
            "/tmp/key",
            "--dps-endpoint",
            "dps.example.com",
            "--request-timeout-ms",
            "1500",
        ])
        .unwrap();

        assert_eq!(cli.dps_endpoint.host(), Some("dps.example.com"));
        assert!(cli.dps_endpoint.to_string().starts_with("https://"));
        assert_eq!(cli.request_timeout, Some(Duration::from_millis(1500)));
    }
}
