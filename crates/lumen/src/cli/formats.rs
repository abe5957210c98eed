//! The `lumen formats` command: probe the encoder and display support.

use std::sync::Arc;

use clap::Args;

use lumen_core::{CapabilityProbe, Config, HostEncoder, ImageRsEncoder};

/// Arguments for the `formats` command.
#[derive(Args, Debug)]
pub struct FormatsArgs {
    /// Print the format list as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the formats command.
pub async fn execute(args: FormatsArgs, config: Config) -> anyhow::Result<()> {
    let encoder: Arc<dyn HostEncoder> =
        Arc::new(ImageRsEncoder::new(config.limits.clone()));
    let probe = CapabilityProbe::new(encoder);

    let infos = probe.format_info_list().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!("Output format support:");
    for info in infos {
        if info.supported {
            println!(
                "  {:<6} {}",
                info.format.name(),
                console::style("supported").green()
            );
        } else {
            let fallback = info
                .fallback
                .map(|f| format!("requests fall back to {f}"))
                .unwrap_or_default();
            println!(
                "  {:<6} {}  {}",
                info.format.name(),
                console::style("unsupported").red(),
                console::style(fallback).dim()
            );
        }
    }
    Ok(())
}
