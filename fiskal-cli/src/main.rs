use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fiskal_core::Fiscalizer;
use fiskal_core::config::{
    Config, Credentials, ENV_APP_CERTIFICATE, ENV_CA_CERTIFICATE, ENV_CERTIFICATE, ENV_ENDPOINT,
    ENV_ENVIRONMENT, ENV_PASSWORD, ENV_PRIVATE_KEY, ENV_TIMEOUT_SECS, Environment,
};
use fiskal_core::message::{Invoice, InvoiceFields, Office, OfficeFields};
use fiskal_core::sign::SignedDocument;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fiskal")]
#[command(about = "Client for the Croatian fiscalization service (CIS)")]
struct Cli {
    /// Target environment: demo or production.
    #[arg(long = "env", env = ENV_ENVIRONMENT, default_value = "demo")]
    environment: Environment,
    /// PEM certificate issued by FINA.
    #[arg(long, env = ENV_CERTIFICATE, required_unless_present = "app_certificate")]
    certificate: Option<PathBuf>,
    /// PEM private key matching the certificate.
    #[arg(long, env = ENV_PRIVATE_KEY, required_unless_present = "app_certificate")]
    private_key: Option<PathBuf>,
    /// PKCS#12 application certificate holding both certificate and key.
    #[arg(
        long,
        env = ENV_APP_CERTIFICATE,
        conflicts_with_all = ["certificate", "private_key"]
    )]
    app_certificate: Option<PathBuf>,
    /// Password of an encrypted private key or of the application certificate.
    #[arg(long, env = ENV_PASSWORD, hide_env_values = true)]
    password: Option<String>,
    /// Request timeout in seconds.
    #[arg(long, env = ENV_TIMEOUT_SECS, default_value_t = 3)]
    timeout: u64,
    /// Additional CA certificate trusted for the service's TLS endpoint.
    #[arg(long, env = ENV_CA_CERTIFICATE)]
    ca_certificate: Option<PathBuf>,
    /// Overrides the environment's service URL.
    #[arg(long, env = ENV_ENDPOINT)]
    endpoint: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Echo message used to check connectivity and credentials.
    Echo {
        text: String,
        #[arg(long)]
        send: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Invoice described by an `InvoiceFields` JSON file.
    Invoice {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        send: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Business premises registration described by an `OfficeFields` JSON file.
    Office {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        send: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn credentials(&self) -> Result<Credentials> {
        if let Some(path) = &self.app_certificate {
            return Ok(Credentials::Pkcs12 { path: path.clone() });
        }
        match (&self.certificate, &self.private_key) {
            (Some(certificate), Some(private_key)) => Ok(Credentials::Pem {
                certificate: certificate.clone(),
                private_key: private_key.clone(),
            }),
            _ => anyhow::bail!(
                "either --app-certificate or --certificate with --private-key is required"
            ),
        }
    }

    fn config(&self) -> Result<Config> {
        let mut config = Config::with_credentials(self.environment, self.credentials()?)
            .with_timeout(Duration::from_secs(self.timeout));
        if let Some(password) = &self.password {
            config = config.with_password(password);
        }
        if let Some(ca_certificate) = &self.ca_certificate {
            config = config.with_ca_certificate(ca_certificate);
        }
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let fiscalizer = Fiscalizer::new(cli.config()?).context("cannot set up fiscalizer")?;

    match cli.command {
        Commands::Echo { text, send, output } => {
            if send {
                let fiscalized = fiscalizer.echo(&text).await?;
                print_json(fiscalized.response())?;
            } else {
                emit(&fiscalizer.sign_echo(&text)?, output.as_deref())?;
            }
        }
        Commands::Invoice {
            input,
            send,
            output,
        } => {
            let invoice = Invoice::new(read_json::<InvoiceFields>(&input)?)
                .with_context(|| format!("invalid invoice in {}", input.display()))?;
            if send {
                let fiscalized = fiscalizer.fiscalize_invoice(&invoice).await?;
                print_json(fiscalized.response())?;
            } else {
                emit(&fiscalizer.sign_invoice(&invoice)?, output.as_deref())?;
            }
        }
        Commands::Office {
            input,
            send,
            output,
        } => {
            let office = Office::new(read_json::<OfficeFields>(&input)?)
                .with_context(|| format!("invalid office in {}", input.display()))?;
            if send {
                let fiscalized = fiscalizer.fiscalize_office(&office).await?;
                print_json(fiscalized.response())?;
            } else {
                emit(&fiscalizer.sign_office(&office)?, output.as_deref())?;
            }
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("cannot parse {}", path.display()))
}

fn emit(document: &SignedDocument, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, document.xml())
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!(message_id = document.message_id(), path = %path.display(), "signed document written");
        }
        None => println!("{}", document.xml()),
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
