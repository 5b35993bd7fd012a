//! Command-line front end for the Bitcoin transaction toolkit.
//!
//! Results go to stdout as JSON or plain text; logs go to stderr and are
//! filtered with `RUST_LOG` (default `info`).

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use chain_btc::esplora::EsploraClient;
use chain_btc::{BtcNetwork, NetworkParameters};
use wallet_core::{
    create_redeem_script, create_signed_transaction, decode_transaction_hex, derive_p2sh_address,
    derive_p2wsh_address, script_hex_to_asm,
};

use crate::config::{SpendConfig, SpendOverrides};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Network used to encode and decode addresses [default: testnet]
    #[arg(long, global = true, env = "BTC_NETWORK")]
    network: Option<BtcNetwork>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a raw transaction into JSON
    Decode {
        #[arg(env = "BTC_TX_HEX")]
        tx_hex: String,
    },
    /// Disassemble a hex script
    Asm { script_hex: String },
    /// Build the OP_SHA256 <sha256(secret)> OP_EQUAL script and its addresses
    RedeemScript { secret: String },
    /// Address of a hex redeem or witness script
    Address {
        script_hex: String,
        #[arg(long, value_enum, default_value_t = AddressKind::P2wsh)]
        kind: AddressKind,
    },
    /// Build and sign a transaction described by a TOML file
    Spend(SpendArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AddressKind {
    P2sh,
    P2wsh,
}

#[derive(clap::Args, Debug)]
struct SpendArgs {
    /// Spend description; see spend.example.toml
    #[arg(short, long, env = "BTC_SPEND_CONFIG")]
    config: PathBuf,
    #[arg(long, env = "BTC_ESPLORA_URL")]
    esplora_url: Option<String>,
    #[arg(long)]
    destination: Option<String>,
    /// Amount in satoshis
    #[arg(long)]
    amount: Option<u64>,
    /// Fixed fee in satoshis
    #[arg(long)]
    fee: Option<u64>,
    #[arg(long)]
    change_address: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn params_for(network: Option<BtcNetwork>) -> NetworkParameters {
    network.unwrap_or(BtcNetwork::Testnet).params()
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn spend(args: SpendArgs, network: Option<BtcNetwork>) -> Result<()> {
    let mut config = SpendConfig::load(&args.config)?;
    config.apply(SpendOverrides {
        network,
        esplora_url: args.esplora_url,
        destination: args.destination,
        amount: args.amount,
        fee: args.fee,
        change_address: args.change_address,
    });

    let params = config.params();
    let request = config.to_request()?;
    let signed = match config.inline_source()? {
        Some(source) => create_signed_transaction(&request, &source, &params)?,
        None => {
            info!(url = %params.esplora_url, "fetching utxos");
            let client = EsploraClient::new(params.esplora_url.clone(), None)?;
            create_signed_transaction(&request, &client, &params)
                .with_context(|| format!("spend from {} failed", request.source_address))?
        }
    };

    print_json(&json!({
        "txid": signed.txid().to_string(),
        "hex": signed.to_hex(),
        "fee": signed.fee,
        "change": signed.change,
        "vsize": signed.transaction.vsize(),
    }))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::Decode { tx_hex } => {
            let decoded = decode_transaction_hex(&tx_hex, &params_for(cli.network))?;
            print_json(&decoded)
        }
        Command::Asm { script_hex } => {
            println!("{}", script_hex_to_asm(&script_hex)?);
            Ok(())
        }
        Command::RedeemScript { secret } => {
            let params = params_for(cli.network);
            let script = create_redeem_script(&secret);
            let script_hex = script.to_hex();
            print_json(&json!({
                "redeem_script": script_hex,
                "asm": script.to_asm()?,
                "p2sh": derive_p2sh_address(&script_hex, &params)?,
                "p2wsh": derive_p2wsh_address(&script_hex, &params)?,
            }))
        }
        Command::Address { script_hex, kind } => {
            let params = params_for(cli.network);
            let address = match kind {
                AddressKind::P2sh => derive_p2sh_address(&script_hex, &params)?,
                AddressKind::P2wsh => derive_p2wsh_address(&script_hex, &params)?,
            };
            println!("{address}");
            Ok(())
        }
        Command::Spend(args) => spend(args, cli.network),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_network_after_subcommand() {
        let cli = Cli::try_parse_from(["btc-cli", "asm", "76a9", "--network", "mainnet"]).unwrap();
        assert_eq!(cli.network, Some(BtcNetwork::Mainnet));
        assert!(matches!(cli.command, Command::Asm { ref script_hex } if script_hex == "76a9"));
    }

    #[test]
    fn address_kind_defaults_to_p2wsh() {
        let cli = Cli::try_parse_from(["btc-cli", "address", "a8"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Address {
                kind: AddressKind::P2wsh,
                ..
            }
        ));
    }

    #[test]
    fn spend_flags_parse() {
        let cli = Cli::try_parse_from([
            "btc-cli",
            "spend",
            "--config",
            "spend.toml",
            "--amount",
            "1000",
            "--fee",
            "200",
        ])
        .unwrap();
        let Command::Spend(args) = cli.command else {
            panic!("expected spend");
        };
        assert_eq!(args.config, PathBuf::from("spend.toml"));
        assert_eq!(args.amount, Some(1_000));
        assert_eq!(args.fee, Some(200));
        assert!(args.destination.is_none());
    }

    #[test]
    fn unknown_network_is_rejected() {
        assert!(Cli::try_parse_from(["btc-cli", "--network", "litecoin", "asm", "00"]).is_err());
    }
}
