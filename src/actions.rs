//! Favourite actions.
//!
//! An action is what Kodi runs when a favourite is selected. Declarations
//! name an action type and a value; [`build`] looks the type up in a closed
//! registry and returns an [`Action`] whose [`render`](Action::render) produces
//! the navigation string written into `favourites.xml`.
//!
//! | tag | type name | renders |
//! |-----|-----------|---------|
//! | `base` | `Base` | the value itself |
//! | `activate_window` | `ActivateWindow` | `ActivateWindow(10025,"<value>",return)` |
//! | `youtube_channel` | `YoutubeChannel` | `activate_window` over the channel plugin URL |
//!
//! Rendered strings are plain text. Quotes and other special characters are
//! entity-escaped by the XML renderer, so `"` lands in the file as `&quot;`.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Unknown action type: {0:?}")]
    UnknownType(String),
}

/// Keyword options passed to an action (declaration keys with the `_` prefix stripped).
pub type ActionOptions = BTreeMap<String, String>;

/// Kodi window id for the video library.
const VIDEO_WINDOW: u32 = 10025;

const YOUTUBE_CHANNEL_URL: &str = "plugin://plugin.video.youtube/channel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Base,
    ActivateWindow,
    YoutubeChannel,
}

/// Registry of action tags. Both spellings of each type resolve to the same kind.
const REGISTRY: &[(&str, ActionKind)] = &[
    ("base", ActionKind::Base),
    ("Base", ActionKind::Base),
    ("activate_window", ActionKind::ActivateWindow),
    ("ActivateWindow", ActionKind::ActivateWindow),
    ("youtube_channel", ActionKind::YoutubeChannel),
    ("YoutubeChannel", ActionKind::YoutubeChannel),
];

impl ActionKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, kind)| *kind)
    }
}

/// A resolved action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Base { value: String },
    ActivateWindow { value: String },
    YoutubeChannel { child: Box<Action> },
}

/// Build an action from its declaration parts.
pub fn build(tag: &str, value: &str, options: &ActionOptions) -> Result<Action, ActionError> {
    let kind = ActionKind::from_tag(tag).ok_or_else(|| ActionError::UnknownType(tag.to_string()))?;
    let value = single_line(value);
    Ok(match kind {
        ActionKind::Base => Action::Base { value },
        ActionKind::ActivateWindow => Action::ActivateWindow { value },
        ActionKind::YoutubeChannel => {
            let url = youtube_channel_url(&value, options.get("path").map(String::as_str));
            Action::YoutubeChannel {
                child: Box::new(build("activate_window", &url, &ActionOptions::new())?),
            }
        }
    })
}

impl Action {
    pub fn render(&self) -> String {
        match self {
            Action::Base { value } => value.clone(),
            Action::ActivateWindow { value } => {
                format!("ActivateWindow({VIDEO_WINDOW},\"{value}\",return)")
            }
            Action::YoutubeChannel { child } => child.render(),
        }
    }
}

/// Join a multi-line YAML value into one line.
fn single_line(value: &str) -> String {
    value.lines().collect()
}

fn youtube_channel_url(channel: &str, path: Option<&str>) -> String {
    let url = format!("{YOUTUBE_CHANNEL_URL}/{channel}");
    match path {
        Some(p) => format!("{url}/{}/", p.trim_matches('/')),
        None => url,
    }
}
