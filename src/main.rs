use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, bail, eyre};
use dss_client::{
    adapters::ByteRangeDocument,
    config::Config,
    domain::dss::{DssClient, RetryPolicy, SigningProfile},
    telemetry,
    tls::{SecureChannel, TlsClientConfig},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    /// Sign with the static certificate bound to the claimed identity
    Static,
    /// Sign with an on-demand certificate issued for the distinguished name
    OnDemand,
    /// On-demand certificate confirmed on the signer's mobile phone
    MobileId,
    /// Request an RFC 3161 timestamp only
    Timestamp,
}

impl From<Profile> for SigningProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Static => SigningProfile::StaticCertificate,
            Profile::OnDemand => SigningProfile::OnDemandCertificate,
            Profile::MobileId => SigningProfile::OnDemandCertificateWithMobileAuth,
            Profile::Timestamp => SigningProfile::TimestampOnly,
        }
    }
}

/// Sign document templates with a remote DSS signing service.
#[derive(Debug, Parser)]
#[command(name = "dss-sign", version)]
struct Cli {
    #[arg(value_enum)]
    profile: Profile,

    /// Document template containing a {{CONTENTS}} marker
    #[arg(short, long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Destination of the signed document, one per input
    #[arg(short, long = "output", required = true)]
    outputs: Vec<PathBuf>,

    /// Request id sent to the service; random when omitted
    #[arg(long)]
    request_id: Option<u32>,

    /// Configuration override, e.g. `--set service.uri=https://...`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    if cli.inputs.len() != cli.outputs.len() {
        bail!(
            "{} inputs but {} outputs given",
            cli.inputs.len(),
            cli.outputs.len()
        );
    }

    let overrides = cli
        .overrides
        .iter()
        .map(|o| {
            o.split_once('=')
                .ok_or_else(|| eyre!("override '{o}' is not KEY=VALUE"))
        })
        .collect::<color_eyre::Result<Vec<_>>>()?;
    let config = Config::load_with_overrides(overrides).context("Loading configuration")?;

    let tls = TlsClientConfig::from_credentials(&config.credentials)
        .context("Loading TLS credentials")?
        .with_timeouts(
            config.service.request_timeout(),
            config.service.connect_timeout(),
        );
    let channel = SecureChannel::open(&config.service.uri, &tls)?;
    let client = DssClient::new(channel).with_retry(RetryPolicy::from(&config.service.retry));

    let mut documents = cli
        .inputs
        .iter()
        .zip(&cli.outputs)
        .map(|(input, output)| {
            ByteRangeDocument::open(input)
                .map(|doc| doc.with_output(output))
                .with_context(|| format!("Reading {}", input.display()))
        })
        .collect::<color_eyre::Result<Vec<_>>>()?;

    let request_id = cli.request_id.unwrap_or_else(rand::random);
    let outcome = client
        .sign(
            cli.profile.into(),
            &mut documents,
            request_id,
            config.signing.hash_algorithm()?,
            Utc::now(),
            &config.signing.sign_options(),
        )
        .await?;

    for output in &cli.outputs {
        tracing::info!(request_id = outcome.request_id, "Signed {}", output.display());
    }
    Ok(())
}
