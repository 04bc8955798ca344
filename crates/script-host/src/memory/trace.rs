use std::fmt::Write as _;

use alloy_primitives::{Address, Selector};

use crate::label::LabelRegistry;

/// What a traced call reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum FrameKind {
    /// A precompile.
    #[display("precompile")]
    Precompile,
    /// A loaded script.
    #[display("script")]
    Script,
    /// A contract deployment.
    #[display("deploy")]
    Deploy,
    /// An address with nothing behind it.
    #[display("empty")]
    Empty,
}

/// One call observed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Nesting depth, 1 for top-level script calls.
    pub depth: usize,
    /// The calling address.
    pub caller: Address,
    /// The called or deployed address.
    pub target: Address,
    /// What the target was.
    pub kind: FrameKind,
    /// The selector of the calldata, if it had one.
    pub selector: Option<Selector>,
    /// The revert reason, if the call failed.
    pub revert: Option<String>,
}

impl CallFrame {
    /// Renders the frame, naming addresses by their labels.
    pub fn render(&self, labels: &LabelRegistry) -> String {
        let mut line = format!(
            "{:indent$}[{}] {} -> {}",
            "",
            self.kind,
            labels.display(&self.caller),
            labels.display(&self.target),
            indent = self.depth.saturating_sub(1) * 2,
        );
        if let Some(selector) = self.selector {
            let _ = write!(line, " {selector}");
        }
        match &self.revert {
            Some(reason) => {
                let _ = write!(line, " reverted: {reason}");
            }
            None => line.push_str(" ok"),
        }
        line
    }
}

/// Calls observed by the host, in call order. Frames accumulate until [`CallTrace::clear`].
#[derive(Debug, Clone, Default)]
pub struct CallTrace {
    frames: Vec<CallFrame>,
}

impl CallTrace {
    /// Records a frame and returns its index.
    pub fn push(&mut self, frame: CallFrame) -> usize {
        self.frames.push(frame);
        self.frames.len() - 1
    }

    /// Marks the frame at `index` as reverted.
    pub fn set_revert(&mut self, index: usize, reason: impl Into<String>) {
        if let Some(frame) = self.frames.get_mut(index) {
            frame.revert = Some(reason.into());
        }
    }

    /// The recorded frames.
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drops every recorded frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Renders every frame on its own line.
    pub fn render(&self, labels: &LabelRegistry) -> String {
        self.frames.iter().map(|frame| frame.render(labels)).collect::<Vec<_>>().join("\n")
    }
}
