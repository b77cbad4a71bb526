//! Commerce RS command line
//!
//! Thin front end over the file and email services.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cm_core::{init_tracing, AppConfig, Site};
use cm_email::{sender_for, MessageCreator, PlaceholderBodyBuilder};
use cm_files::{FileService, LocalFileServiceProvider};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(
        cli.log_level
            .as_deref()
            .unwrap_or("info,cm_files=debug,cm_email=debug"),
    );

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        warn!("Failed to load config from env: {}, using defaults", e);
        AppConfig::default()
    });

    let provider = Arc::new(LocalFileServiceProvider::new(&config.files.storage_path));
    let service = FileService::new(config.files.clone(), provider);

    match cli.command {
        Commands::Publish {
            files,
            prefix,
            site,
        } => {
            let site = site.map(Site::new);
            let names =
                commands::publish(&service, &files, prefix.as_deref(), site.as_ref()).await?;
            for name in names {
                println!("{}", name);
            }
        }
        Commands::Get { name, output } => {
            let data = service
                .get_resource(&name)
                .await?
                .with_context(|| format!("resource '{}' not found", name))?;
            match output {
                Some(path) => tokio::fs::write(&path, &data)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
        Commands::Remove { name } => {
            if service.remove_resource(&name).await? {
                info!(name = %name, "Resource removed");
            } else {
                anyhow::bail!("resource '{}' not found", name);
            }
        }
        Commands::Static { name } => match service.get_static_resource(&name).await {
            Some(stream) => println!("{} ({} bytes)", name, stream.len()),
            None => anyhow::bail!("static resource '{}' not available", name),
        },
        Commands::RenderPlain { file } => {
            let html = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            print!("{}", cm_email::html_to_plain(&html));
        }
        Commands::Mail {
            to,
            subject,
            template,
            vars,
            cc,
            bcc,
            attach,
        } => {
            let props = commands::mail_properties(
                &config.email,
                commands::MailRequest {
                    to,
                    subject,
                    template,
                    vars,
                    cc,
                    bcc,
                    attachments: attach,
                },
            )
            .await?;
            let creator = MessageCreator::new(
                sender_for(&config.email),
                PlaceholderBodyBuilder::new(String::new()),
            );
            let id = creator.send_message(&props).await?;
            println!("{}", id);
        }
    }

    Ok(())
}
