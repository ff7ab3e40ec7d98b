//! stickerctl: drives the sticker client against a running server.
//!
//! Connection settings come from the config file (see `stickerctl config`).

use anyhow::{anyhow, bail, Context};
use std::env;

use sticker_picker::config::{self, Config};
use sticker_picker::host::{self, ChannelArgument, HostSnapshot, PickerLaunch, StaticHost};
use sticker_picker::models::{Post, Sticker, StickerCollection, UploadFile};
use sticker_picker::post_reference::{self, HiddenPreviews};
use sticker_picker::routes::Locators;
use sticker_picker::uploader::orchestrator::{self, UploadForm, UploadMode};
use sticker_picker::StickerClient;

const USAGE: &str = "usage: stickerctl <command>

commands:
  list                              list all stickers
  search <term>                     search stickers by name
  upload <name> <path> [channel]    upload one image file
  from-url <name> <url> [channel]   import an image from a URL
  bulk <channel|-> <path>...        upload several files, named after the files
  delete <id>                       delete a sticker you created
  image-url <id>                    print the image URL of a sticker
  send <id> <channel> [root]        post a sticker through the plugin
  share <id> <channel> [root]       post a sticker as a host file attachment
  resolve <post.json>               show which image a post renders
  config                            print the config path and values
  config reset                      restore the default config";

#[tokio::main]
async fn main() {
    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {}. Using defaults.", e);
            Config::default()
        }
    };

    // Initialize logging
    env_logger::Builder::from_default_env()
        .parse_filters(&config.log_level)
        .init();

    if let Err(e) = run(config, env::args().skip(1).collect()).await {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config, args: Vec<String>) -> anyhow::Result<()> {
    let Some((command, rest)) = args.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    if command == "config" {
        match rest {
            [] => {
                println!("{}", config::get_config_path()?.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            [action] if action == "reset" => {
                config::reset_config().context("Failed to reset config")?;
                println!("Config reset to defaults");
            }
            _ => bail!("unrecognised arguments\n\n{}", USAGE),
        }
        return Ok(());
    }

    if command == "resolve" {
        let path = arg(rest, 0, "post.json")?;
        return resolve_post(&config, path);
    }

    let client = config
        .build_client()
        .context("Failed to build sticker client")?;

    match (command.as_str(), rest) {
        ("list", []) => print_collection(&client.list().await?),
        ("search", [term]) => print_collection(&client.search(term).await?),
        ("upload", [name, path, channel @ ..]) => {
            let mut form = UploadForm::new(UploadMode::File);
            form.name = name.clone();
            form.file = Some(UploadFile::from_path(path).await?);
            upload(&client, &form, channel.first()).await?;
        }
        ("from-url", [name, source_url, channel @ ..]) => {
            let mut form = UploadForm::new(UploadMode::Url);
            form.name = name.clone();
            form.url = source_url.clone();
            upload(&client, &form, channel.first()).await?;
        }
        ("bulk", [channel, paths @ ..]) => {
            let mut form = UploadForm::new(UploadMode::Bulk);
            for path in paths {
                form.batch.push(UploadFile::from_path(path).await?);
            }
            let channel = Some(channel).filter(|c| c.as_str() != "-");
            upload(&client, &form, channel).await?;
        }
        ("delete", [id]) => {
            client.remove(id).await?;
            println!("Deleted {}", id);
        }
        ("image-url", [id]) => println!("{}", client.image_locator(id)),
        ("send", [id, channel, root @ ..]) => {
            let post = client
                .send(id, channel, root.first().map(String::as_str))
                .await?;
            println!("Posted {} in {}", post.id, post.channel_id);
        }
        ("share", [id, channel, root @ ..]) => {
            let sticker = find_sticker(&client, id).await?;
            let host = StaticHost::new(HostSnapshot {
                current_user_id: String::new(),
                current_channel_id: channel.clone(),
                selected_post_id: root.first().cloned(),
            });
            let launch = PickerLaunch::resolve(&ChannelArgument::Absent, &host);
            let post = host::deliver_selection(&client, &launch, &sticker).await?;
            println!("Posted {} in {}", post.id, post.channel_id);
        }
        _ => bail!("unrecognised arguments\n\n{}", USAGE),
    }

    Ok(())
}

async fn upload(
    client: &StickerClient,
    form: &UploadForm,
    channel: Option<&String>,
) -> anyhow::Result<()> {
    let request = form
        .prepare(channel.map(String::as_str))
        .map_err(|e| anyhow!("{}", e))?;

    let outcome = orchestrator::submit(client, &request)
        .await
        .map_err(|message| anyhow!(message))?;

    if let Some(result) = &outcome.batch_result {
        for line in result.summary_lines() {
            println!("{}", line);
        }
        if result.has_failures() {
            bail!("{} file(s) failed", result.failed.len());
        }
    } else {
        println!("Uploaded");
    }

    Ok(())
}

async fn find_sticker(client: &StickerClient, id: &str) -> anyhow::Result<Sticker> {
    client
        .list()
        .await?
        .stickers
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| anyhow!("No sticker with id {}", id))
}

fn resolve_post(config: &Config, path: &str) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let post: Post = serde_json::from_str(&text).context("Not a post")?;

    let previews = HiddenPreviews::new();
    match post_reference::render(&post, &config.routes()?, &previews) {
        Some(resolved) => {
            println!("{} {}", resolved.display_name, resolved.image_locator);
            if resolved.suppress_attachment_preview {
                println!("(attachment preview hidden)");
            }
        }
        None => println!("Invalid sticker"),
    }

    Ok(())
}

fn print_collection(collection: &StickerCollection) {
    if collection.is_empty() {
        println!("No stickers");
        return;
    }

    for sticker in &collection.stickers {
        println!(
            "{}\t{}\t{}\t{}",
            sticker.id,
            sticker.name,
            sticker.creator_id,
            sticker.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("{} of {}", collection.stickers.len(), collection.total);
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing <{}>\n\n{}", name, USAGE))
}
