//! Operator CLI.
//!
//! # Responsibility
//! - Check `participation_core` linkage without starting the server.
//! - Generate API keys for the `API_KEYS` server setting.

use clap::{Parser, Subcommand};

const KEY_BYTES: usize = 32;

#[derive(Parser)]
#[command(name = "participation_cli")]
#[command(about = "Participation tracker operations CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print core ping and version.
    Ping,
    /// Print random hex API keys and a ready-to-paste `API_KEYS=` line.
    GenerateKeys {
        #[arg(default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..))]
        count: u16,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Ping => {
            println!("participation_core ping={}", participation_core::ping());
            println!("participation_core version={}", participation_core::core_version());
        }
        Commands::GenerateKeys { count } => {
            let keys = generate_keys(usize::from(count));
            for (index, key) in keys.iter().enumerate() {
                println!("key {}: {key}", index + 1);
            }
            println!();
            println!("API_KEYS={}", keys.join(","));
        }
    }
}

fn generate_keys(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| hex::encode(rand::random::<[u8; KEY_BYTES]>()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{generate_keys, Cli, Commands};
    use clap::Parser;

    #[test]
    fn keys_are_distinct_64_char_hex() {
        let keys = generate_keys(4);
        assert_eq!(keys.len(), 4);
        for key in &keys {
            assert_eq!(key.len(), 64);
            assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        }
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn generate_keys_defaults_to_three() {
        let cli = Cli::try_parse_from(["participation_cli", "generate-keys"]).unwrap();
        assert!(matches!(cli.command, Commands::GenerateKeys { count: 3 }));

        assert!(Cli::try_parse_from(["participation_cli", "generate-keys", "0"]).is_err());
    }
}
