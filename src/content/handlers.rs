//! Built-in content handlers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use url::Url;

use super::{ContentHandler, ContentKind, ContentObject, Preview};
use crate::domain::event::interpretation;
use crate::domain::{Event, Subject};

/// Web pages (`http`/`https`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebHandler;

/// Application launchers (`application://name.desktop`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationHandler;

/// Instant-messaging conversations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationHandler;

/// Local files. Fallback for `file://` subjects.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHandler;

/// Last-resort handler for anything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericHandler;

impl ContentHandler for WebHandler {
    fn name(&self) -> &'static str {
        "web"
    }

    fn can_handle(&self, _event: &Event, subject: &Subject) -> bool {
        matches!(subject.scheme().as_deref(), Some("http" | "https"))
    }

    fn build(&self, _event: &Event, subject: &Subject) -> ContentObject {
        let host = Url::parse(&subject.uri)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        ContentObject {
            uri: subject.uri.clone(),
            kind: ContentKind::Web,
            title: title_or(subject, || host.unwrap_or_else(|| subject.uri.clone())),
            icon_name: "text-html".to_string(),
            mimetype: mimetype_or(subject, "text/html"),
            preview: Preview::Unavailable,
            handler: self.name(),
        }
    }
}

impl ContentHandler for ApplicationHandler {
    fn name(&self) -> &'static str {
        "application"
    }

    fn can_handle(&self, _event: &Event, subject: &Subject) -> bool {
        subject.scheme().as_deref() == Some("application")
    }

    fn build(&self, _event: &Event, subject: &Subject) -> ContentObject {
        let desktop_id = subject
            .uri
            .split_once("://")
            .map_or(subject.uri.as_str(), |(_, rest)| rest);
        let stem = desktop_id.strip_suffix(".desktop").unwrap_or(desktop_id);
        ContentObject {
            uri: subject.uri.clone(),
            kind: ContentKind::Application,
            title: title_or(subject, || stem.to_string()),
            icon_name: stem.to_string(),
            mimetype: mimetype_or(subject, "application/x-desktop"),
            preview: Preview::Unavailable,
            handler: self.name(),
        }
    }
}

impl ContentHandler for ConversationHandler {
    fn name(&self) -> &'static str {
        "conversation"
    }

    fn can_handle(&self, event: &Event, subject: &Subject) -> bool {
        subject.interpretation == interpretation::IM_MESSAGE
            || ((event.interpretation == interpretation::SEND_EVENT
                || event.interpretation == interpretation::RECEIVE_EVENT)
                && subject.scheme().as_deref() == Some("xmpp"))
    }

    fn build(&self, _event: &Event, subject: &Subject) -> ContentObject {
        ContentObject {
            uri: subject.uri.clone(),
            kind: ContentKind::Conversation,
            title: title_or(subject, || {
                if subject.origin.is_empty() {
                    subject.uri.clone()
                } else {
                    subject.origin.clone()
                }
            }),
            icon_name: "internet-group-chat".to_string(),
            mimetype: subject.mimetype.clone(),
            preview: Preview::Unavailable,
            handler: self.name(),
        }
    }
}

impl ContentHandler for FileHandler {
    fn name(&self) -> &'static str {
        "file"
    }

    fn can_handle(&self, _event: &Event, subject: &Subject) -> bool {
        subject.scheme().as_deref() == Some("file")
    }

    fn build(&self, _event: &Event, subject: &Subject) -> ContentObject {
        let path = Url::parse(&subject.uri)
            .ok()
            .and_then(|u| u.to_file_path().ok());
        let probe = path.as_deref().map(probe_file);

        let is_dir = matches!(probe, Some(FileProbe::Directory));
        let preview = match (probe, path.as_ref()) {
            (Some(FileProbe::File { size, modified }), Some(path)) => Preview::Available {
                path: path.clone(),
                size,
                modified,
            },
            _ => Preview::Unavailable,
        };
        if !preview.is_available() && !is_dir {
            tracing::debug!(uri = %subject.uri, "file missing; no preview");
        }

        let icon_name = if is_dir {
            "folder".to_string()
        } else {
            icon_for_mimetype(&subject.mimetype)
        };
        ContentObject {
            uri: subject.uri.clone(),
            kind: ContentKind::File,
            title: title_or(subject, || file_name(path.as_deref(), &subject.uri)),
            icon_name,
            mimetype: subject.mimetype.clone(),
            preview,
            handler: self.name(),
        }
    }
}

impl ContentHandler for GenericHandler {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn can_handle(&self, _event: &Event, _subject: &Subject) -> bool {
        true
    }

    fn build(&self, _event: &Event, subject: &Subject) -> ContentObject {
        ContentObject {
            uri: subject.uri.clone(),
            kind: ContentKind::Generic,
            title: title_or(subject, || subject.uri.clone()),
            icon_name: icon_for_mimetype(&subject.mimetype),
            mimetype: subject.mimetype.clone(),
            preview: Preview::Unavailable,
            handler: self.name(),
        }
    }
}

enum FileProbe {
    File {
        size: u64,
        modified: Option<DateTime<Utc>>,
    },
    Directory,
    Missing,
}

fn probe_file(path: &Path) -> FileProbe {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => FileProbe::Directory,
        Ok(meta) => FileProbe::File {
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        },
        Err(_) => FileProbe::Missing,
    }
}

fn title_or(subject: &Subject, fallback: impl FnOnce() -> String) -> String {
    if subject.text.is_empty() {
        fallback()
    } else {
        subject.text.clone()
    }
}

fn mimetype_or(subject: &Subject, fallback: &str) -> String {
    if subject.mimetype.is_empty() {
        fallback.to_string()
    } else {
        subject.mimetype.clone()
    }
}

fn file_name(path: Option<&Path>, uri: &str) -> String {
    path.and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| uri.to_string())
}

/// Maps a MIME type to a freedesktop icon name.
#[must_use]
pub fn icon_for_mimetype(mimetype: &str) -> String {
    let icon = match mimetype {
        "" => "text-x-generic",
        "inode/directory" => "folder",
        "text/html" => "text-html",
        m if m.starts_with("image/") => "image-x-generic",
        m if m.starts_with("audio/") => "audio-x-generic",
        m if m.starts_with("video/") => "video-x-generic",
        m if m.starts_with("text/") => "text-x-generic",
        other => return other.replace('/', "-"),
    };
    icon.to_string()
}

/// Builds a `file://` URI for a local path.
#[must_use]
pub fn file_uri(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(String::from)
}

/// Resolves a `file://` URI back to a local path.
#[must_use]
pub fn file_path(uri: &str) -> Option<PathBuf> {
    Url::parse(uri).ok()?.to_file_path().ok()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::domain::EventId;

    fn event(interp: &str, subject: Subject) -> Event {
        Event {
            id: EventId::new(1),
            timestamp: 0,
            interpretation: interp.to_string(),
            manifestation: String::new(),
            actor: String::new(),
            subjects: vec![subject],
        }
    }

    #[test]
    fn web_title_falls_back_to_host() {
        let subject = Subject::new("https://docs.rs/tokio/latest");
        let e = event(interpretation::ACCESS_EVENT, subject.clone());
        assert!(WebHandler.can_handle(&e, &subject));
        let object = WebHandler.build(&e, &subject);
        assert_eq!(object.title, "docs.rs");
        assert_eq!(object.mimetype, "text/html");
    }

    #[test]
    fn application_icon_is_desktop_stem() {
        let subject = Subject::new("application://org.gnome.gedit.desktop");
        let e = event(interpretation::ACCESS_EVENT, subject.clone());
        assert!(ApplicationHandler.can_handle(&e, &subject));
        let object = ApplicationHandler.build(&e, &subject);
        assert_eq!(object.icon_name, "org.gnome.gedit");
        assert_eq!(object.kind, ContentKind::Application);
    }

    #[test]
    fn conversation_matches_im_subjects() {
        let subject = Subject {
            uri: "xmpp://alice@example.org".to_string(),
            interpretation: interpretation::IM_MESSAGE.to_string(),
            origin: "alice".to_string(),
            ..Subject::default()
        };
        let e = event(interpretation::RECEIVE_EVENT, subject.clone());
        assert!(ConversationHandler.can_handle(&e, &subject));
        assert_eq!(ConversationHandler.build(&e, &subject).title, "alice");
        assert!(!WebHandler.can_handle(&e, &subject));
    }

    #[test]
    fn existing_file_has_preview() {
        let Ok(mut file) = tempfile::NamedTempFile::new() else {
            panic!("temp file");
        };
        let _ = file.write_all(b"hello journal");
        let Some(uri) = file_uri(file.path()) else {
            panic!("file uri");
        };
        let subject = Subject {
            uri,
            mimetype: "text/plain".to_string(),
            ..Subject::default()
        };
        let e = event(interpretation::ACCESS_EVENT, subject.clone());

        let object = FileHandler.build(&e, &subject);
        let Preview::Available { size, .. } = object.preview else {
            panic!("preview expected");
        };
        assert_eq!(size, 13);
        assert_eq!(object.icon_name, "text-x-generic");
    }

    #[test]
    fn directory_gets_folder_icon() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("temp dir");
        };
        let Some(uri) = file_uri(dir.path()) else {
            panic!("dir uri");
        };
        let subject = Subject::new(uri);
        let e = event(interpretation::ACCESS_EVENT, subject.clone());
        let object = FileHandler.build(&e, &subject);
        assert_eq!(object.icon_name, "folder");
        assert!(!object.preview.is_available());
    }

    #[test]
    fn deleted_file_still_builds() {
        let subject = Subject::new("file:///nonexistent/dir/photo.jpg");
        let e = event(interpretation::ACCESS_EVENT, subject.clone());
        let object = FileHandler.build(&e, &subject);
        assert_eq!(object.title, "photo.jpg");
        assert_eq!(object.preview, Preview::Unavailable);
    }

    #[test]
    fn mimetype_icons() {
        assert_eq!(icon_for_mimetype("image/png"), "image-x-generic");
        assert_eq!(icon_for_mimetype("application/pdf"), "application-pdf");
        assert_eq!(icon_for_mimetype(""), "text-x-generic");
    }

    #[test]
    fn file_uri_round_trips_to_path() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("temp dir");
        };
        let Some(uri) = file_uri(dir.path()) else {
            panic!("dir uri");
        };
        assert_eq!(file_path(&uri).as_deref(), Some(dir.path()));
    }
}
