//! Operator command line.

use std::io::Write;

use clap::{Parser, Subcommand};

use crate::domain::{IdScope, ResourceType};
use crate::service::IdService;

/// Command line arguments for the `idbuilder` binary.
///
/// Generator settings come from `config/*.toml` and `IDBUILDER__*`
/// environment variables; the command line only picks what to generate.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "idbuilder",
    version,
    about = "Generate and validate Snowflake, ULID, segment and public ids"
)]
pub struct CliArgs {
    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print ULIDs.
    Ulid {
        /// How many to print.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Print Snowflake ids.
    Snowflake {
        /// How many to print.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Print segment ids for a scope.
    Segment {
        /// Scope name, e.g. `order` or `coupon_template`.
        #[arg(long)]
        scope: IdScope,
        /// How many to print.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Print public ids for a resource type.
    PublicId {
        /// Resource type name or prefix, e.g. `order` or `ord`.
        #[arg(long = "type")]
        resource_type: ResourceType,
        /// How many to print.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Validate a public id against a resource type.
    Validate {
        /// Expected resource type.
        #[arg(long = "type")]
        resource_type: ResourceType,
        /// The public id to check.
        candidate: String,
    },
    /// Decode a public id of any known type.
    Decode {
        /// The public id to decode.
        candidate: String,
    },
}

/// Run one command against `service`, writing results to `out`.
///
/// # Errors
///
/// Returns an error if generation fails, validation fails, or `out` cannot be
/// written.
pub async fn execute<W: Write>(
    service: &IdService,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Ulid { count } => {
            for _ in 0..count {
                writeln!(out, "{}", service.next_ulid_string()?)?;
            }
        }
        Command::Snowflake { count } => {
            for _ in 0..count {
                writeln!(out, "{}", service.next_snowflake()?)?;
            }
        }
        Command::Segment { scope, count } => {
            for _ in 0..count {
                writeln!(out, "{}", service.next_segment(scope).await?)?;
            }
        }
        Command::PublicId {
            resource_type,
            count,
        } => {
            for _ in 0..count {
                writeln!(out, "{}", service.next_public_id(resource_type)?)?;
            }
        }
        Command::Validate {
            resource_type,
            candidate,
        } => {
            let ulid = service.decode_public_id(resource_type, &candidate)?;
            writeln!(
                out,
                "valid {resource_type} id, ulid {ulid}, timestamp {}",
                ulid.timestamp_millis()
            )?;
        }
        Command::Decode { candidate } => {
            let (resource_type, ulid) = service.public_id_codec().decode_any(&candidate)?;
            writeln!(
                out,
                "{resource_type} {ulid} timestamp {}",
                ulid.timestamp_millis()
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, StorageBackend};

    async fn service() -> IdService {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.snowflake.node_id = Some(1);
        IdService::from_config(&config).await.unwrap()
    }

    async fn run(args: &[&str]) -> anyhow::Result<String> {
        let args = CliArgs::try_parse_from(std::iter::once("idbuilder").chain(args.iter().copied()))?;
        let service = service().await;
        let mut out = Vec::new();
        execute(&service, args.command, &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    #[tokio::test]
    async fn test_ulid_count() {
        let out = run(&["ulid", "-n", "3"]).await.unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.len() == 26));
    }

    #[tokio::test]
    async fn test_segment() {
        let out = run(&["segment", "--scope", "order_item", "--count", "2"])
            .await
            .unwrap();
        assert_eq!(out, "1\n2\n");
    }

    #[tokio::test]
    async fn test_public_id_then_validate() {
        let out = run(&["public-id", "--type", "coupon"]).await.unwrap();
        let id = out.trim();
        assert!(id.starts_with("cpn_"));

        let out = run(&["validate", "--type", "cpn", id]).await.unwrap();
        assert!(out.starts_with("valid cpn id"));

        let err = run(&["validate", "--type", "order", id]).await.unwrap_err();
        assert!(err.to_string().contains("type mismatch"));
    }

    #[tokio::test]
    async fn test_decode() {
        let out = run(&["decode", "usr_00000000000000000000000001"])
            .await
            .unwrap();
        assert_eq!(out, "usr 00000000000000000000000001 timestamp 0\n");
    }

    #[test]
    fn test_unknown_scope_rejected() {
        assert!(CliArgs::try_parse_from(["idbuilder", "segment", "--scope", "nope"]).is_err());
    }
}
