// libs/appointment-cell/src/services/telemedicine.rs
use uuid::Uuid;

use shared_config::AppConfig;

/// Builds video room links. Jitsi rooms need no account: the URL is the room.
#[derive(Debug, Clone)]
pub struct TelemedicineProvider {
    base_url: String,
    room_prefix: String,
}

impl TelemedicineProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_config(&config.meeting_base_url, &config.meeting_room_prefix)
    }

    pub fn with_config(base_url: &str, room_prefix: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            room_prefix: room_prefix.trim_matches('-').to_string(),
        }
    }

    pub fn room_link(&self, appointment_id: Uuid) -> String {
        format!("{}/{}-{}", self.base_url, self.room_prefix, appointment_id)
    }
}

/// Doctor-supplied links must be absolute http(s) URLs.
pub fn is_valid_meeting_link(link: &str) -> bool {
    let link = link.trim();
    (link.starts_with("https://") || link.starts_with("http://"))
        && !link.contains(char::is_whitespace)
        && link.split("://").nth(1).is_some_and(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_link_embeds_appointment_id() {
        let provider = TelemedicineProvider::with_config("https://meet.jit.si/", "DrAbuHanif-Consultation");
        let id = Uuid::parse_str("6f1c1c1e-3f4b-4a7e-9b8d-2f0c3f0b9a11").unwrap();

        assert_eq!(
            provider.room_link(id),
            "https://meet.jit.si/DrAbuHanif-Consultation-6f1c1c1e-3f4b-4a7e-9b8d-2f0c3f0b9a11"
        );
    }

    #[test]
    fn meeting_links_must_be_web_urls() {
        assert!(is_valid_meeting_link("https://zoom.us/j/123"));
        assert!(!is_valid_meeting_link("zoom.us/j/123"));
        assert!(!is_valid_meeting_link("https://"));
        assert!(!is_valid_meeting_link("https://meet example"));
    }
}
