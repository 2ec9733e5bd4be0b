use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::ClientId;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const CLIENT_ID_LEN: usize = 20;

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Random alphanumeric connection id
pub fn generate_client_id() -> ClientId {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CLIENT_ID_LEN)
        .map(char::from)
        .collect();
    ClientId::new(id)
}

// Fully saturated color with a random hue
pub fn random_hue_color() -> String {
    let hue = rand::thread_rng().gen_range(0..360);
    format!("hsl({}, 100%, 50%)", hue)
}
