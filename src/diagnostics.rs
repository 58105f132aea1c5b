//! Layout trace output. The engine never logs directly; it writes to a
//! [`Diagnostics`] sink passed in by the caller.

pub trait Diagnostics {
    /// Decisions taken by the pagination algorithm.
    fn algorithm(&mut self, msg: &str);
    /// Creation of pages, columns and elements.
    fn elements(&mut self, msg: &str);
}

/// Forwards both channels to the `log` facade.
#[derive(Default)]
pub struct LogSink;

impl Diagnostics for LogSink {
    fn algorithm(&mut self, msg: &str) {
        log::debug!(target: "pasteup::algorithm", "{msg}");
    }

    fn elements(&mut self, msg: &str) {
        log::trace!(target: "pasteup::elements", "{msg}");
    }
}

/// Keeps every message, for inspecting a run after the fact.
#[derive(Default, Debug)]
pub struct CapturingSink {
    pub algorithm: Vec<String>,
    pub elements: Vec<String>,
}

impl Diagnostics for CapturingSink {
    fn algorithm(&mut self, msg: &str) {
        self.algorithm.push(msg.to_string());
    }

    fn elements(&mut self, msg: &str) {
        self.elements.push(msg.to_string());
    }
}

impl CapturingSink {
    pub fn contains(&self, needle: &str) -> bool {
        self.algorithm
            .iter()
            .chain(&self.elements)
            .any(|m| m.contains(needle))
    }
}
