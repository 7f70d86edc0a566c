//! Viewer event bridge
//!
//! Native viewers report activity as a single `|`-delimited string such as
//! `pageChanged|3|10`. Messages are parsed once into [`ViewerEvent`] and then
//! dispatched to the host's [`ViewListener`]. Viewers able to send structured
//! messages can deliver the same events as tagged JSON objects instead, e.g.
//! `{"event": "pageChanged", "page": 3, "pageCount": 10}`.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Separator between the event name and its arguments
pub const DELIMITER: char = '|';

/// Notification emitted by the native viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewerEvent {
    LoadComplete { page_count: u32 },
    PageChanged { page: u32, page_count: u32 },
    Error { message: String },
    /// The viewer's page token, forwarded as sent
    PageSingleTap { page: String },
    ScaleChanged { scale: f32 },
}

impl ViewerEvent {
    /// Parse a delimited viewer message.
    ///
    /// Returns `None` for unknown event names and for numeric arguments that
    /// do not parse. Arguments are positional, so anything after the last
    /// expected argument is dropped.
    pub fn parse(message: &str) -> Option<Self> {
        let (name, rest) = message
            .split_once(DELIMITER)
            .unwrap_or((message, ""));
        let mut args = rest.split(DELIMITER);

        let event = match name {
            "loadComplete" => ViewerEvent::LoadComplete {
                page_count: int_arg(args.next())?,
            },
            "pageChanged" => ViewerEvent::PageChanged {
                page: int_arg(args.next())?,
                page_count: int_arg(args.next())?,
            },
            "error" => ViewerEvent::Error {
                message: args.next().unwrap_or_default().to_string(),
            },
            "pageSingleTap" => ViewerEvent::PageSingleTap {
                page: args.next().unwrap_or_default().to_string(),
            },
            "scaleChanged" => ViewerEvent::ScaleChanged {
                scale: args.next()?.trim().parse().ok()?,
            },
            _ => return None,
        };
        Some(event)
    }
}

fn int_arg(arg: Option<&str>) -> Option<u32> {
    arg?.trim().parse().ok()
}

/// Callbacks a host registers on a view.
///
/// Every method defaults to a no-op, so hosts only implement what they need.
pub trait ViewListener: Send + Sync {
    /// Download progress in `[0, 1]`
    fn on_load_progress(&self, _fraction: f32) {}

    /// The viewer opened the document at `path`
    fn on_load_complete(&self, _page_count: u32, _path: &Path) {}

    fn on_page_changed(&self, _page: u32, _page_count: u32) {}

    /// Acquisition or viewer failure, as a human-readable message
    fn on_error(&self, _message: &str) {}

    fn on_page_single_tap(&self, _page: &str) {}

    fn on_scale_changed(&self, _scale: f32) {}
}

/// Listener that ignores every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoListener;

impl ViewListener for NoListener {}

/// Deliver `event` to `listener`. `path` is the document currently shown.
pub fn dispatch(listener: &dyn ViewListener, event: &ViewerEvent, path: &Path) {
    match event {
        ViewerEvent::LoadComplete { page_count } => listener.on_load_complete(*page_count, path),
        ViewerEvent::PageChanged { page, page_count } => {
            listener.on_page_changed(*page, *page_count)
        }
        ViewerEvent::Error { message } => listener.on_error(message),
        ViewerEvent::PageSingleTap { page } => listener.on_page_single_tap(page),
        ViewerEvent::ScaleChanged { scale } => listener.on_scale_changed(*scale),
    }
}
