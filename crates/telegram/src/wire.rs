use coverbot_core::session::UserId;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: Option<TgUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TgUser {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: i64,
    pub height: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TgFile {
    pub file_path: Option<String>,
}

/// The three inputs the dialog understands. Everything else in an update
/// (stickers, voice, edits, ...) classifies to `None` and is dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    Start,
    Photo { file_id: String },
    Text(String),
}

pub fn classify(update: &Update) -> Option<(UserId, UpdateKind)> {
    let message = update.message.as_ref()?;
    let user = UserId(message.from.as_ref()?.id);

    if let Some(photo) = largest_photo(&message.photo) {
        return Some((user, UpdateKind::Photo { file_id: photo.file_id.clone() }));
    }

    let text = message.text.as_deref()?;
    if is_start_command(text) {
        return Some((user, UpdateKind::Start));
    }
    // Other bot commands are not part of the script; drop them like any
    // unsupported payload.
    if text.trim_start().starts_with('/') {
        return None;
    }
    Some((user, UpdateKind::Text(text.to_owned())))
}

/// Telegram sends one entry per resolution; pick the largest rendition.
fn largest_photo(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes.iter().max_by_key(|size| size.width * size.height)
}

fn is_start_command(text: &str) -> bool {
    let command = text.trim_start().split_whitespace().next().unwrap_or("");
    let command = command.split('@').next().unwrap_or(command);
    command == "/start"
}

#[cfg(test)]
mod tests {
    use coverbot_core::session::UserId;

    use super::{classify, Update, UpdateKind};

    fn parse(json: &str) -> Update {
        serde_json::from_str(json).expect("valid update json")
    }

    #[test]
    fn start_command_classifies_to_start() {
        for text in ["/start", " /start", "/start@coverbot", "/start now"] {
            let update = parse(&format!(
                r#"{{"update_id":1,"message":{{"from":{{"id":42}},"text":"{text}"}}}}"#
            ));
            let (user, kind) = classify(&update).expect("classified");
            assert_eq!(user, UserId(42));
            assert_eq!(kind, UpdateKind::Start, "text was {text:?}");
        }
    }

    #[test]
    fn plain_text_classifies_to_text() {
        let update =
            parse(r#"{"update_id":2,"message":{"from":{"id":7},"text":"yes"}}"#);
        assert_eq!(classify(&update), Some((UserId(7), UpdateKind::Text("yes".to_owned()))));
    }

    #[test]
    fn photo_takes_the_largest_size() {
        let update = parse(
            r#"{"update_id":3,"message":{"from":{"id":9},"photo":[
                {"file_id":"thumb","width":90,"height":90},
                {"file_id":"full","width":1280,"height":960},
                {"file_id":"medium","width":320,"height":240}
            ]}}"#,
        );
        assert_eq!(
            classify(&update),
            Some((UserId(9), UpdateKind::Photo { file_id: "full".to_owned() }))
        );
    }

    #[test]
    fn photo_wins_over_caption_text() {
        let update = parse(
            r#"{"update_id":4,"message":{"from":{"id":9},"text":"caption","photo":[
                {"file_id":"only","width":100,"height":100}
            ]}}"#,
        );
        assert!(matches!(classify(&update), Some((_, UpdateKind::Photo { .. }))));
    }

    #[test]
    fn unsupported_payloads_are_dropped() {
        // No message at all.
        assert_eq!(classify(&parse(r#"{"update_id":5}"#)), None);
        // Message without sender.
        assert_eq!(classify(&parse(r#"{"update_id":6,"message":{"text":"hi"}}"#)), None);
        // Sticker-like message: neither text nor photo.
        assert_eq!(classify(&parse(r#"{"update_id":7,"message":{"from":{"id":1}}}"#)), None);
        // Unknown command.
        assert_eq!(
            classify(&parse(r#"{"update_id":8,"message":{"from":{"id":1},"text":"/help"}}"#)),
            None
        );
    }
}
