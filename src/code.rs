//! Label id allocation and the code container.
//!
//! Label identities are owned by the [`CodeContainer`], not by the builder:
//! an id stays meaningful across builder resets and can be shared with
//! other emitters targeting the same container. The builder registers its
//! label *nodes* against these ids.
//!
//! Ids handed out are *packed*: the dense label index plus
//! [`PACKED_ID_BASE`]. Packing keeps label ids out of the small-integer
//! range used by other operand ids, so a stray integer is unlikely to alias
//! a real label.

use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::operand::Label;

/// Offset added to a dense label index to form a packed label id.
pub const PACKED_ID_BASE: u32 = 0x100;

/// Kind of a named label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LabelKind {
    /// Anonymous label, no name.
    #[default]
    Anonymous = 0,
    /// Local label, unique within its parent.
    Local = 1,
    /// Global label, unique within the container.
    Global = 2,
}

/// Per-label bookkeeping.
#[derive(Debug, Clone, Default)]
struct LabelEntry {
    kind: LabelKind,
    parent: Option<Label>,
    name: Option<String>,
}

/// Allocates label ids and resolves label names.
#[derive(Debug, Default)]
pub struct CodeContainer {
    entries: Vec<LabelEntry>,
    names: FxHashMap<String, Label>,
}

impl CodeContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh anonymous label id.
    pub fn new_label_id(&mut self) -> Label {
        let label = Label::from_id(self.entries.len() as u32 + PACKED_ID_BASE);
        self.entries.push(LabelEntry::default());
        label
    }

    /// Allocate a fresh named label id.
    ///
    /// Fails with [`Error::InvalidArgument`] if the name is empty or already
    /// taken, or if `parent` names an unknown label.
    pub fn new_named_label_id(
        &mut self,
        name: &str,
        kind: LabelKind,
        parent: Option<Label>,
    ) -> Result<Label, Error> {
        if name.is_empty() || self.names.contains_key(name) {
            return Err(Error::InvalidArgument);
        }
        if let Some(parent) = parent {
            if !self.is_label_valid(parent) {
                return Err(Error::InvalidLabel);
            }
        }

        let label = Label::from_id(self.entries.len() as u32 + PACKED_ID_BASE);
        self.entries.push(LabelEntry {
            kind,
            parent,
            name: Some(name.to_string()),
        });
        self.names.insert(name.to_string(), label);
        Ok(label)
    }

    /// Number of labels allocated so far.
    #[inline]
    pub fn label_count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Unpack a label id into its dense index.
    ///
    /// Returns `None` for ids this container never produced.
    pub fn unpack_id(&self, id: u32) -> Option<u32> {
        let index = id.checked_sub(PACKED_ID_BASE)?;
        if index < self.label_count() {
            Some(index)
        } else {
            None
        }
    }

    /// Check if `label` names a label allocated by this container.
    #[inline]
    pub fn is_label_valid(&self, label: Label) -> bool {
        label.is_valid() && self.unpack_id(label.id()).is_some()
    }

    /// Resolve a label by name.
    pub fn label_by_name(&self, name: &str) -> Option<Label> {
        self.names.get(name).copied()
    }

    /// Name of a label, if it has one.
    pub fn label_name(&self, label: Label) -> Option<&str> {
        let index = self.unpack_id(label.id())?;
        self.entries[index as usize].name.as_deref()
    }

    /// Kind of a label.
    pub fn label_kind(&self, label: Label) -> Option<LabelKind> {
        let index = self.unpack_id(label.id())?;
        Some(self.entries[index as usize].kind)
    }

    /// Parent of a local label.
    pub fn label_parent(&self, label: Label) -> Option<Label> {
        let index = self.unpack_id(label.id())?;
        self.entries[index as usize].parent
    }

    /// Drop all labels.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.names.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
