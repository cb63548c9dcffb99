use crate::embeds::{error_embed, Embed};
use crate::models::{Interaction, INTERACTION_APPLICATION_COMMAND, INTERACTION_PING};
use crate::services::command_service::{Command, CommandContext};
use crate::services::elasticsearch_service::SearchBackend;
use anyhow::{Context, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use log::{info, warn};
use reqwest::Client;
use serde_json::{json, Value};

const DISCORD_API: &str = "https://discord.com/api/v10";

const RESPONSE_PONG: u8 = 1;
const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
const FLAG_EPHEMERAL: u64 = 1 << 6;

// Application command option types
const OPTION_STRING: u8 = 3;
const OPTION_INTEGER: u8 = 4;
const OPTION_BOOLEAN: u8 = 5;

pub fn parse_public_key(hex_key: &str) -> Result<VerifyingKey> {
    let bytes: [u8; 32] = hex::decode(hex_key.trim())
        .context("public key is not valid hex")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("public key must be 32 bytes"))?;
    VerifyingKey::from_bytes(&bytes).context("public key is not a valid ed25519 key")
}

/// Checks Discord's `X-Signature-Ed25519` over `timestamp + body`.
pub fn verify_signature(key: &VerifyingKey, signature_hex: &str, timestamp: &str, body: &str) -> bool {
    let Ok(bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body.as_bytes());
    key.verify(&message, &signature).is_ok()
}

pub fn message_response(embed: &Embed, ephemeral: bool) -> Value {
    let mut data = json!({ "embeds": [embed] });
    if ephemeral {
        data["flags"] = json!(FLAG_EPHEMERAL);
    }
    json!({ "type": RESPONSE_CHANNEL_MESSAGE, "data": data })
}

/// Answers a verified interaction: PONG for pings, an embed message for commands.
pub async fn respond<B: SearchBackend>(commands: &CommandContext<'_, B>, interaction: &Interaction) -> Value {
    match (interaction.kind, &interaction.data) {
        (INTERACTION_PING, _) => json!({ "type": RESPONSE_PONG }),
        (INTERACTION_APPLICATION_COMMAND, Some(data)) => {
            let Some(user_id) = interaction.user_id() else {
                return message_response(&error_embed("Could not tell who ran this command"), true);
            };
            match Command::parse(&data.name, &interaction.options()) {
                Ok(command) => message_response(&commands.run(user_id, command).await, false),
                Err(message) => message_response(&error_embed(&message), true),
            }
        }
        (kind, _) => {
            warn!("Unsupported interaction type {kind}");
            message_response(&error_embed("Unsupported interaction"), true)
        }
    }
}

fn option(kind: u8, name: &str, description: &str, required: bool) -> Value {
    json!({
        "type": kind,
        "name": name,
        "description": description,
        "required": required
    })
}

/// Slash command definitions for every command the bot understands.
pub fn command_definitions() -> Value {
    let query = |required| option(OPTION_STRING, "query", "Phrase to search for", required);
    let field = || option(OPTION_STRING, "field", "Only search this field, e.g. title", false);

    json!([
        {
            "name": "search",
            "description": "Search the database by phrase",
            "options": [query(true), field()]
        },
        {
            "name": "searchr",
            "description": "Search by date. Range is +- 4 days from given.",
            "options": [
                option(OPTION_STRING, "date", "Date to search around, e.g. 2015-03-01", true),
                query(false),
                field()
            ]
        },
        {
            "name": "searchda",
            "description": "Search database, sorted by date ascending",
            "options": [query(true), field()]
        },
        {
            "name": "searchdd",
            "description": "Search database, sorted by date descending",
            "options": [query(true), field()]
        },
        {
            "name": "choose",
            "description": "Choose a video from a search",
            "options": [option(OPTION_INTEGER, "number", "Number of the video in the listing", true)]
        },
        {
            "name": "thumb",
            "description": "Get a thumbnail for a particular video id",
            "options": [option(OPTION_STRING, "video_id", "Video id or YouTube URL", false)]
        },
        {
            "name": "stats",
            "description": "Display stats about the database",
            "options": [option(OPTION_BOOLEAN, "series", "Include estimates per series", false)]
        },
        {
            "name": "about",
            "description": "About this bot"
        }
    ])
}

/// Overwrites the application's global slash commands.
pub async fn register_commands(application_id: &str, bot_token: &str) -> Result<()> {
    let response = Client::new()
        .put(format!("{DISCORD_API}/applications/{application_id}/commands"))
        .header("Authorization", format!("Bot {bot_token}"))
        .json(&command_definitions())
        .send()
        .await
        .context("Discord command registration request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        warn!("Discord rejected command registration ({status}): {text}");
        return Err(anyhow::anyhow!("Discord command registration failed with status {status}"));
    }

    info!("Registered slash commands for application {application_id}");
    Ok(())
}
