use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use camo_proxy::codec::{self, encode_path, Encoding, SignedPath, SigningKey};
use camo_proxy::config::loader::read_config;

#[derive(Parser)]
#[command(name = "url-tool")]
#[command(about = "Sign and verify camo-proxy URLs", long_about = None)]
struct Cli {
    /// HMAC signing key
    #[arg(short, long, env = "CAMO_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Read the key from the [signing] section of this config file
    #[arg(short, long, env = "CAMO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the signed proxy path for a target URL
    Encode {
        /// Use base64url instead of hex
        #[arg(short, long)]
        base64: bool,

        /// Proxy base URL prepended to the path
        #[arg(short, long, default_value = "")]
        prefix: String,

        url: String,
    },
    /// Verify a signed proxy URL or path and print its target
    Decode { url: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let key = signing_key(cli.key, cli.config)?;

    match cli.command {
        Commands::Encode {
            base64,
            prefix,
            url,
        } => {
            let encoding = if base64 {
                Encoding::Base64
            } else {
                Encoding::Hex
            };
            let path = encode_path(&key, &url, encoding);
            println!("{}{}", prefix.trim_end_matches('/'), path);
        }
        Commands::Decode { url } => {
            let path = match Url::parse(&url) {
                Ok(parsed) => parsed.path().to_owned(),
                Err(_) => url,
            };
            let signed = find_signed(&path).ok_or("not a signed proxy path")?;
            let target = codec::verify(&key, signed.encoding, signed.digest, signed.encoded_url)?;
            println!("{}", String::from_utf8_lossy(&target));
        }
    }

    Ok(())
}

fn signing_key(
    flag: Option<String>,
    config: Option<PathBuf>,
) -> Result<SigningKey, Box<dyn std::error::Error>> {
    let key = match (flag, config) {
        (Some(key), _) => key,
        (None, Some(path)) => read_config(&path)?.signing.hmac_key,
        (None, None) => String::new(),
    };
    if key.is_empty() {
        return Err("no HMAC key: pass --key, set CAMO_KEY, or point --config at a file with [signing] hmac_key".into());
    }
    Ok(SigningKey::new(key.into_bytes()))
}

/// The signed part may sit under a path prefix, so try each suffix.
fn find_signed(path: &str) -> Option<SignedPath<'_>> {
    path.match_indices('/')
        .find_map(|(i, _)| SignedPath::parse(&path[i..]))
}
