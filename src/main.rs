use color_eyre::eyre::{
    Result,
    WrapErr,
    bail,
    eyre,
};
use serde::Serialize;
use supra_status_client::{
    ClientConfig,
    FallbackConfig,
    SupraClient,
    telemetry,
};

const USAGE: &str = "usage: supra-status [--log-dir DIR] [--fallback FILE] \
<status|whitelist|treasury|balances|admin|commands|vrf-log LOTTERY_ID [LIMIT]>";

struct Args {
    log_dir: Option<String>,
    fallback: Option<String>,
    view: Vec<String>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args {
        log_dir: None,
        fallback: None,
        view: Vec::new(),
    };
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--log-dir" => args.log_dir = Some(raw.next().ok_or_else(|| eyre!(USAGE))?),
            "--fallback" => args.fallback = Some(raw.next().ok_or_else(|| eyre!(USAGE))?),
            _ => args.view.push(arg),
        }
    }
    Ok(args)
}

fn print(view: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(view)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = parse_args(std::env::args().skip(1))?;
    match &args.log_dir {
        Some(dir) => telemetry::init_file_tracing(dir),
        None => telemetry::init_tracing(),
    }

    let config = ClientConfig::from_env().wrap_err("invalid environment")?;
    let mut client = SupraClient::from_config(&config)?;
    if let Some(path) = &args.fallback {
        let fallback = FallbackConfig::from_path(path)
            .wrap_err_with(|| format!("failed to load fallback config from {path}"))?;
        client = client.with_fallback(fallback);
    }

    let view: Vec<&str> = args.view.iter().map(String::as_str).collect();
    match view.as_slice() {
        ["status"] | [] => print(&client.lottery_status().await?),
        ["whitelist"] => print(&client.whitelist_status().await?),
        ["treasury"] => print(&client.treasury_config().await?),
        ["balances"] => print(&client.treasury_balances().await?),
        ["admin"] => print(&client.admin_config().await?),
        ["commands"] => print(&client.list_commands().await?),
        ["vrf-log", id, rest @ ..] => {
            let lottery_id = id.parse().wrap_err("lottery id must be a number")?;
            let limit = match rest {
                [] => None,
                [limit] => Some(limit.parse().wrap_err("limit must be a number")?),
                _ => bail!(USAGE),
            };
            print(&client.vrf_log(lottery_id, limit).await?)
        }
        _ => bail!(USAGE),
    }
}
