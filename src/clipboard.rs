use log::{debug, info, warn};
use std::fmt;

/// Text starting with this marker is published as rich text.
pub const RTF_MARKER: &str = "{\\rtf1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    PlainText,
    RichText,
}

impl Flavor {
    pub fn mime(&self) -> &'static str {
        match self {
            Flavor::PlainText => "text/plain; charset=utf-8",
            Flavor::RichText => "text/rtf",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardPayload {
    PlainText(String),
    RichText(Vec<u8>),
}

impl ClipboardPayload {
    pub fn from_text(text: &str) -> Self {
        if text.starts_with(RTF_MARKER) {
            ClipboardPayload::RichText(encode_ascii(text))
        } else {
            ClipboardPayload::PlainText(text.to_string())
        }
    }

    pub fn flavors(&self) -> &'static [Flavor] {
        match self {
            ClipboardPayload::PlainText(_) => &[Flavor::PlainText],
            ClipboardPayload::RichText(_) => &[Flavor::RichText],
        }
    }

    pub fn supports(&self, flavor: Flavor) -> bool {
        self.flavors().contains(&flavor)
    }

    pub fn transfer_data(&self, flavor: Flavor) -> Option<Vec<u8>> {
        match (self, flavor) {
            (ClipboardPayload::PlainText(text), Flavor::PlainText) => {
                Some(text.as_bytes().to_vec())
            }
            (ClipboardPayload::RichText(bytes), Flavor::RichText) => Some(bytes.clone()),
            _ => None,
        }
    }
}

/// RTF is 7-bit; anything else becomes `?`.
fn encode_ascii(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| if ch.is_ascii() { ch as u8 } else { b'?' })
        .collect()
}

/// One representation offered by the current clipboard owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Compares the `type/subtype` part of two MIME strings, ignoring parameters.
pub fn mime_matches(mime: &str, essence: &str) -> bool {
    let base = mime.split(';').next().unwrap_or("").trim();
    base.eq_ignore_ascii_case(essence.trim())
}

#[derive(thiserror::Error, Debug)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Platform(#[from] arboard::Error),
    #[error("clipboard flavor {0} is not supported on this platform")]
    Unsupported(Flavor),
    #[error("clipboard rejected {0} data")]
    Rejected(Flavor),
}

pub trait ClipboardBackend {
    /// Representations currently on the clipboard, in the owner's preference order.
    fn offers(&mut self) -> Result<Vec<Offer>, ClipboardError>;
    fn publish(&mut self, payload: &ClipboardPayload) -> Result<(), ClipboardError>;
}

/// Plain-text / rich-text view of the system clipboard. Never fails towards the caller.
pub struct ClipboardBridge<B> {
    backend: B,
    owned: Option<Vec<u8>>,
}

impl<B: ClipboardBackend> ClipboardBridge<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            owned: None,
        }
    }

    pub fn write(&mut self, text: &str) {
        let payload = ClipboardPayload::from_text(text);
        match self.backend.publish(&payload) {
            Ok(()) => self.owned = payload.transfer_data(payload.flavors()[0]),
            Err(err) if matches!(payload, ClipboardPayload::RichText(_)) => {
                debug!("rich text publish failed ({err}), falling back to plain text");
                let fallback = ClipboardPayload::PlainText(text.to_string());
                match self.backend.publish(&fallback) {
                    Ok(()) => self.owned = Some(text.as_bytes().to_vec()),
                    Err(err) => warn!("failed to write clipboard: {err}"),
                }
            }
            Err(err) => warn!("failed to write clipboard: {err}"),
        }
    }

    /// Reads the first `text/plain` representation; empty when there is none.
    pub fn read(&mut self) -> String {
        let offers = match self.backend.offers() {
            Ok(offers) => offers,
            Err(err) => {
                warn!("failed to read clipboard: {err}");
                return String::new();
            }
        };
        self.track_ownership(&offers);
        let Some(offer) = offers
            .into_iter()
            .find(|offer| mime_matches(&offer.mime, "text/plain"))
        else {
            return String::new();
        };
        match String::from_utf8(offer.data) {
            Ok(text) => text,
            Err(err) => {
                warn!("clipboard text is not valid UTF-8: {err}");
                String::new()
            }
        }
    }

    fn track_ownership(&mut self, offers: &[Offer]) {
        let Some(owned) = &self.owned else { return };
        if offers.iter().all(|offer| &offer.data != owned) {
            info!("clipboard ownership lost to another application");
            self.owned = None;
        }
    }
}

/// The platform clipboard via arboard, with a native rich-text path on macOS.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    fn clipboard(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        let clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new()?,
        };
        Ok(self.inner.insert(clipboard))
    }
}

impl ClipboardBackend for SystemClipboard {
    fn offers(&mut self) -> Result<Vec<Offer>, ClipboardError> {
        match self.clipboard()?.get_text() {
            Ok(text) => Ok(vec![Offer {
                mime: Flavor::PlainText.mime().to_string(),
                data: text.into_bytes(),
            }]),
            Err(arboard::Error::ContentNotAvailable) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn publish(&mut self, payload: &ClipboardPayload) -> Result<(), ClipboardError> {
        match payload {
            ClipboardPayload::PlainText(text) => {
                self.clipboard()?.set_text(text.clone())?;
                Ok(())
            }
            ClipboardPayload::RichText(bytes) => publish_rich_text(bytes),
        }
    }
}

#[cfg(target_os = "macos")]
fn publish_rich_text(bytes: &[u8]) -> Result<(), ClipboardError> {
    use objc2_app_kit::{NSPasteboard, NSPasteboardTypeRTF};
    use objc2_foundation::NSData;

    let data = NSData::with_bytes(bytes);
    let written = unsafe {
        let pasteboard = NSPasteboard::generalPasteboard();
        pasteboard.clearContents();
        pasteboard.setData_forType(Some(&data), NSPasteboardTypeRTF)
    };
    if written {
        Ok(())
    } else {
        Err(ClipboardError::Rejected(Flavor::RichText))
    }
}

#[cfg(not(target_os = "macos"))]
fn publish_rich_text(_bytes: &[u8]) -> Result<(), ClipboardError> {
    Err(ClipboardError::Unsupported(Flavor::RichText))
}
