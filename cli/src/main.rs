use anyhow::{Context, Result, bail};
use burnlink_core::Ttl;
use burnlink_core::token::TOKEN_SEPARATOR;
use burnlink_shared::{
    CreateSecretRequest, CreateSecretResponse, ErrorResponse, RevealedSecret, SecretStatus,
};
use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Parser, Debug)]
#[command(version, about = "Share secrets through one-time links")]
struct Cli {
    /// Base URL of the burnlink server
    #[arg(long, global = true, env = "BURNLINK_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a new secret and print its one-time link
    Send {
        /// The secret content to store
        ///
        /// This can be any UTF-8 text. Consider quoting the value
        /// if it contains spaces or special characters.
        #[arg(short, long, value_name = "TEXT")]
        text: String,

        /// How long the link stays valid if nobody opens it
        ///
        /// One of: hour, day, week, "two weeks".
        #[arg(short = 'e', long, value_name = "TTL", default_value = "day")]
        ttl: Ttl,
    },

    /// Check whether a link is still live without opening it
    Check {
        /// Full link returned by `send`, or just the token
        #[arg(long, value_name = "LINK|TOKEN")]
        source: String,
    },

    /// Open a link. The secret is deleted on the server afterwards
    Recv {
        /// Full link returned by `send`, or just the token
        #[arg(long, value_name = "LINK|TOKEN")]
        source: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let client = Client::new();
    let api = format!("{}/api/secrets", cli.server.trim_end_matches('/'));

    match cli.command {
        Command::Send { text, ttl } => {
            let request = CreateSecretRequest {
                plaintext: text,
                ttl: ttl.to_string(),
            };

            let created: CreateSecretResponse = read_json(client.post(&api).json(&request).send()?)
                .context("Failed to create secret")?;

            println!("{}", created.link);
        }
        Command::Check { source } => {
            let token = token_from_source(&source)?;
            let response = client.get(format!("{api}/{token}")).send()?;

            if response.status() == StatusCode::NOT_FOUND {
                println!("Secret not found. It expired, was already viewed, or never existed.");
                return Ok(());
            }

            let status: SecretStatus = read_json(response).context("Failed to check secret")?;
            if status.exists {
                println!("Secret is live and has not been viewed yet.");
            }
        }
        Command::Recv { source } => {
            let token = token_from_source(&source)?;
            let response = client.post(format!("{api}/{token}/reveal")).send()?;

            if response.status() == StatusCode::NOT_FOUND {
                bail!("Secret not found. It expired, was already viewed, or never existed.");
            }

            let revealed: RevealedSecret =
                read_json(response).context("Failed to retrieve secret")?;
            println!("{}", revealed.plaintext);
        }
    }
    Ok(())
}

/// Accepts a full link or a bare token and returns the token.
fn token_from_source(source: &str) -> Result<&str> {
    let without_fragment = source.split(['#', '?']).next().unwrap_or_default();
    let Some(token) = without_fragment.trim_end_matches('/').rsplit('/').next() else {
        bail!("Could not find the secret token in the link.");
    };

    if token.matches(TOKEN_SEPARATOR).count() != 1 {
        bail!("Could not find the secret token in the link.");
    }
    Ok(token)
}

fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json()?);
    }

    match response.json::<ErrorResponse>() {
        Ok(body) => bail!("server returned {status}: {}", body.error),
        Err(_) => bail!("server returned {status}"),
    }
}
