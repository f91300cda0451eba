use crate::server;
use clap::{Args, Parser, Subcommand};
use ship_and_weigh::config::AppConfig;
use ship_and_weigh::error::AppError;
use ship_and_weigh::settings::SettingsSpec;
use ship_and_weigh::verification::{Address, AddressVerifier, EasyPostClient};

#[derive(Parser, Debug)]
#[command(
    name = "Ship and Weigh API",
    about = "Serve the Ship and Weigh admin API or run one-off checks from the shell",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Verify a single address against the configured provider
    VerifyAddress(VerifyAddressArgs),
    /// Print every declared setting with its type and default as JSON
    SettingsSchema,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct VerifyAddressArgs {
    #[arg(long)]
    street1: Option<String>,
    #[arg(long)]
    street2: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    zip: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    company: Option<String>,
    /// Print the raw verification result as JSON
    #[arg(long)]
    json: bool,
}

impl VerifyAddressArgs {
    fn address(&self) -> Address {
        Address {
            street1: self.street1.clone(),
            street2: self.street2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip: self.zip.clone(),
            country: self.country.clone(),
            name: self.name.clone(),
            company: self.company.clone(),
        }
        .compact()
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::VerifyAddress(args) => verify_address(args).await,
        Command::SettingsSchema => print_settings_schema(),
    }
}

async fn verify_address(args: VerifyAddressArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let client = EasyPostClient::new(&config.easypost)?;
    let address = args.address();
    let result = client.verify_address(&address).await?;

    if args.json {
        print_json(&result)?;
        return Ok(());
    }

    if result.verified {
        println!("verified: {}", address.one_line());
    } else {
        println!("not verified: {}", address.one_line());
    }
    if let Some(normalized) = &result.normalized_address {
        println!("normalized: {}", normalized.one_line());
    }
    for error in &result.errors {
        match &error.field {
            Some(field) => println!("  - {field}: {}", error.message),
            None => println!("  - {}", error.message),
        }
    }
    Ok(())
}

fn print_settings_schema() -> Result<(), AppError> {
    let spec = SettingsSpec::standard();
    print_json(&spec.describe())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| AppError::Io(err.into()))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["ship-and-weigh-api"]).expect("parses");
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["ship-and-weigh-api", "serve", "--port", "9090"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => assert_eq!(args.port, Some(9090)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verify_address_collects_and_compacts_fields() {
        let cli = Cli::try_parse_from([
            "ship-and-weigh-api",
            "verify-address",
            "--street1",
            "417 Montgomery St",
            "--street2",
            "  ",
            "--zip",
            "94104",
            "--json",
        ])
        .expect("parses");

        let Some(Command::VerifyAddress(args)) = cli.command else {
            panic!("expected verify-address");
        };
        assert!(args.json);
        let address = args.address();
        assert_eq!(address.street1.as_deref(), Some("417 Montgomery St"));
        assert_eq!(address.street2, None);
        assert_eq!(address.zip.as_deref(), Some("94104"));
    }

    #[test]
    fn settings_schema_parses() {
        let cli = Cli::try_parse_from(["ship-and-weigh-api", "settings-schema"]).expect("parses");
        assert!(matches!(cli.command, Some(Command::SettingsSchema)));
    }
}
