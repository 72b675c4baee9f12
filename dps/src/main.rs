use std::error::Error;
use std::sync::Arc;

use tracing::{debug, error, instrument, trace, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod cli;

use dps_remote as remote;
use dps_util as util;

use crate::cli::Cli;
use crate::remote::{
    CachePolicy, ConnectionResolver, DeviceIdentity, KeyFile, Provisioner, ProvisioningConfig,
    RegistrationCache, SecretProvider,
};
use crate::util::interrupt::Interrupt;
use crate::util::types::SharedKey;

fn initialize_tracing() {
    // Initialize tracing subscriber for human-readable logs
    tracing_subscriber::registry()
        .with(
            // Use some log defaults. These can be overriden using
            // RUST_LOG
            EnvFilter::try_from_default_env().unwrap_or(
                EnvFilter::default()
                    .add_directive("debug".parse().unwrap())
                    .add_directive("hyper=error".parse().unwrap())
                    .add_directive("hyper_util=error".parse().unwrap())
                    .add_directive("reqwest=info".parse().unwrap())
                    .add_directive("rustls=error".parse().unwrap()),
            ),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    initialize_tracing();

    let cli = cli::parse();

    let interrupt = Interrupt::new();
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling registration");
                interrupt.trigger();
            }
        });
    }

    let conn = resolve(cli, interrupt).await?;
    println!("{conn}");

    Ok(())
}

#[instrument(name = "dps", skip_all, err)]
async fn resolve(cli: Cli, interrupt: Interrupt) -> Result<String, Box<dyn Error>> {
    let mut config = ProvisioningConfig::new(cli.dps_endpoint, cli.id_scope);
    config.api_version = cli.dps_api_version;
    if let Some(timeout) = cli.request_timeout {
        config.request.timeout = timeout;
    }
    trace!(config = ?config, "using config:");

    let secrets: Arc<dyn SecretProvider> = match (cli.group_key, cli.group_key_file) {
        (Some(key), _) => Arc::new(SharedKey::from(key)),
        (None, Some(path)) => Arc::new(KeyFile::new(path)),
        (None, None) => return Err("no group key given".into()),
    };

    // a single lookup per run, nothing to expire
    let cache = Arc::new(RegistrationCache::new(CachePolicy::Memoize));
    let resolver = ConnectionResolver::new(Provisioner::new(config, cache, secrets));

    let mut device = DeviceIdentity::new(cli.device_id);
    if let Some(gateway_id) = cli.gateway_id {
        device = device.with_gateway(gateway_id);
    }

    let mut conn = match resolver.connection_string(&device, Some(interrupt)).await {
        Ok(conn) => conn,
        Err(err) => {
            error!(status = ?err.status_code(), "provisioning failed");
            return Err(err.into());
        }
    };
    debug!(host = %conn.host_name, "device provisioned");

    if let Some(host) = cli.gateway_host_name {
        conn = conn.with_gateway_host(host);
    }

    Ok(conn.to_string())
}
