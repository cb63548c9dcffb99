#[macro_use]
extern crate rocket;

use etc_archive_bot::api::{handle_interaction, search_by_date, search_videos, stats};
use etc_archive_bot::config::{create_app_state, init_logger, load_environment};
use rocket::data::{Limits, ToByteUnit};

#[launch]
async fn rocket() -> _ {
    load_environment();
    init_logger();

    let app_state = match create_app_state().await {
        Ok(state) => state,
        Err(e) => {
            log::error!("Failed to start the bot: {e:#}");
            std::process::exit(1);
        }
    };

    // Interaction payloads are read as a string so the signature covers the exact bytes.
    let figment = rocket::Config::figment()
        .merge(("limits", Limits::default().limit("string", 64.kibibytes())));

    rocket::custom(figment)
        .manage(app_state)
        .mount("/interactions", routes![handle_interaction])
        .mount("/api", routes![search_videos, search_by_date, stats])
}
