use mockdropd::config::ServerConfig;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Run { addr: Option<String> },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut addr = None;
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--addr" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--addr requires a value"))?;
                addr = Some(value);
            }
            "--help" | "-h" => return Ok(CliMode::Help),
            other => match other.strip_prefix("--addr=") {
                Some(value) => addr = Some(value.to_string()),
                None => anyhow::bail!("unknown argument: {other}"),
            },
        }
    }
    Ok(CliMode::Run { addr })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("Usage: mockdropd [--addr <host:port>]");
            println!("  --addr   Listen address (default: $MOCKDROP_ADDR or localhost:7162)");
            return Ok(());
        }
        CliMode::Run { addr } => addr,
    };
    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = addr {
        config = config.with_addr(addr)?;
    }
    mockdropd::http::serve(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parse_cli_mode_defaults_to_run() {
        let mode = parse_cli_mode(args(&["mockdropd"])).unwrap();
        assert_eq!(mode, CliMode::Run { addr: None });
    }

    #[test]
    fn parse_cli_mode_reads_addr() {
        let expected = CliMode::Run {
            addr: Some("0.0.0.0:8080".to_string()),
        };
        let mode = parse_cli_mode(args(&["mockdropd", "--addr", "0.0.0.0:8080"])).unwrap();
        assert_eq!(mode, expected);
        let mode = parse_cli_mode(args(&["mockdropd", "--addr=0.0.0.0:8080"])).unwrap();
        assert_eq!(mode, expected);
        assert!(parse_cli_mode(args(&["mockdropd", "--addr"])).is_err());
    }

    #[test]
    fn parse_cli_mode_supports_help() {
        let mode = parse_cli_mode(args(&["mockdropd", "--help"])).unwrap();
        assert_eq!(mode, CliMode::Help);
    }

    #[test]
    fn parse_cli_mode_rejects_unknown_arguments() {
        assert!(parse_cli_mode(args(&["mockdropd", "--logout"])).is_err());
    }
}
