use crate::models::{DiscordSignature, Interaction};
use crate::services::discord_service::{respond, verify_signature};
use crate::AppState;
use log::{debug, error, warn};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::serde::json::{Json, Value};
use rocket::{post, Request, State};

#[rocket::async_trait]
impl<'r> FromRequest<'r> for DiscordSignature {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();
        match (
            headers.get_one("X-Signature-Ed25519"),
            headers.get_one("X-Signature-Timestamp"),
        ) {
            (Some(signature), Some(timestamp)) => Outcome::Success(DiscordSignature {
                signature: signature.to_string(),
                timestamp: timestamp.to_string(),
            }),
            _ => Outcome::Error((Status::Unauthorized, "Missing signature headers")),
        }
    }
}

#[post("/", data = "<body>")]
pub async fn handle_interaction(
    signature: DiscordSignature,
    state: &State<AppState>,
    body: String,
) -> Result<Json<Value>, Status> {
    if !verify_signature(
        &state.public_key,
        &signature.signature,
        &signature.timestamp,
        &body,
    ) {
        warn!("Rejected interaction with an invalid signature");
        return Err(Status::Unauthorized);
    }

    let interaction: Interaction = match serde_json::from_str(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            error!("Failed to parse interaction: {e}");
            return Err(Status::BadRequest);
        }
    };
    debug!("Received interaction: {interaction:?}");

    Ok(Json(respond(&state.commands(), &interaction).await))
}
