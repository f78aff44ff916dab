//! The stack of open groups, and binding the open group to the keys.
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use macropad_types::color::Rgb;

use crate::config::{LayoutMode, TAB_SIZE};
use crate::display::{Display, Pixels};
use crate::key_indicator::KeyIndicator;
use crate::macro_store::MacroStore;
use crate::node::{EncoderBindings, MacroNode, NodeId, NodeKind, NodeRef, ROOT_ID};

/// LED color of the toolbar keys in the tabbed layout
const TOOLBAR_COLOR: Rgb = Rgb::new(0x20, 0x20, 0x20);

/// What a key does when pressed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoundAction {
    OpenGroup(NodeId),
    RunMacro(NodeId),
    PrevTab,
    NextTab,
    CloseGroup,
    GoToRoot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Frame {
    id: NodeId,
    tab: usize,
}

impl Frame {
    fn root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            tab: 0,
        }
    }
}

/// Stack of open group ids, the root group is always at the bottom.
///
/// The mutating calls only change the stack, [`NavigationStack::refresh_group`] applies it to the keys.
#[derive(Clone, Debug)]
pub struct NavigationStack {
    stack: Vec<Frame>,
    layout: LayoutMode,
    /// Number of tabs of the open group, as of the last refresh
    tabs: usize,
    encoder: EncoderBindings,
}

impl NavigationStack {
    pub fn new(layout: LayoutMode) -> Self {
        Self {
            stack: vec![Frame::root()],
            layout,
            tabs: 1,
            encoder: EncoderBindings::default(),
        }
    }

    pub fn open(&mut self, id: &str) {
        self.stack.push(Frame {
            id: id.to_string(),
            tab: 0,
        });
    }

    /// Go one level up. Does nothing at the root
    pub fn close(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    pub fn reset_to_root(&mut self) {
        self.stack.clear();
        self.stack.push(Frame::root());
    }

    pub fn current(&self) -> &NodeId {
        // The stack is never empty
        &self.stack[self.stack.len() - 1].id
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Tab of the open group, always `0` in the direct layout
    pub fn tab(&self) -> usize {
        self.top().tab
    }

    /// Returns `false` if already on the last tab
    pub fn next_tab(&mut self) -> bool {
        let tabs = self.tabs;
        let frame = self.top_mut();
        if frame.tab + 1 < tabs {
            frame.tab += 1;
            true
        } else {
            false
        }
    }

    /// Returns `false` if already on the first tab
    pub fn prev_tab(&mut self) -> bool {
        let frame = self.top_mut();
        if frame.tab > 0 {
            frame.tab -= 1;
            true
        } else {
            false
        }
    }

    /// Encoder bindings of the open group
    pub fn encoder_bindings(&self) -> &EncoderBindings {
        &self.encoder
    }

    fn top(&self) -> &Frame {
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Bind the open group to the keys, draw the title and take over its encoder bindings.
    ///
    /// A missing or non-group node on top of the stack resets the stack to the root. If the root is unusable as
    /// well, all keys are blank.
    pub fn refresh_group<D: Display + Pixels + ?Sized>(
        &mut self,
        store: &MacroStore,
        keys: &mut [KeyIndicator],
        invert: bool,
        device: &mut D,
    ) {
        let mut group = store.get(self.current());
        if !matches!(group, Some(MacroNode::Group { .. })) {
            error!("Node {} is not a group, going back to root", self.current().as_str());
            self.reset_to_root();
            group = store.get(ROOT_ID);
        }

        keys.iter_mut().for_each(KeyIndicator::clear);
        let title = match group {
            Some(MacroNode::Group {
                label,
                content,
                encoder,
                ..
            }) => {
                self.encoder = encoder.clone();
                self.bind_content(store, content, keys);
                if self.tabs > 1 {
                    format!("{} {}/{}", label, self.tab() + 1, self.tabs)
                } else {
                    label.clone()
                }
            }
            _ => {
                error!("Root group is missing, all keys are blank");
                self.encoder = EncoderBindings::default();
                self.tabs = 1;
                String::new()
            }
        };

        for key in keys.iter() {
            key.update_visual(invert, device);
        }
        device.show();
        device.set_title(&title);
    }

    fn bind_content(&mut self, store: &MacroStore, content: &[NodeRef], keys: &mut [KeyIndicator]) {
        let tabbed = match self.layout {
            LayoutMode::Tabbed if keys.len() >= TAB_SIZE + 3 => true,
            LayoutMode::Tabbed => {
                warn!("Tabbed layout needs {} keys, using direct layout", TAB_SIZE + 3);
                false
            }
            LayoutMode::Direct => false,
        };

        if !tabbed {
            self.tabs = 1;
            self.top_mut().tab = 0;
            for (key, item) in keys.iter_mut().zip(content) {
                bind_slot(store, item, key);
            }
            return;
        }

        self.tabs = content.len().div_ceil(TAB_SIZE).max(1);
        let tab = self.tab().min(self.tabs - 1);
        self.top_mut().tab = tab;

        let page = content.iter().skip(tab * TAB_SIZE).take(TAB_SIZE);
        for (key, item) in keys.iter_mut().zip(page) {
            bind_slot(store, item, key);
        }

        if tab > 0 {
            keys[TAB_SIZE].set(NodeKind::Group, "<", TOOLBAR_COLOR, false, Some(BoundAction::PrevTab));
        }
        if self.depth() > 1 {
            keys[TAB_SIZE + 1].set(NodeKind::Group, "Back", TOOLBAR_COLOR, false, Some(BoundAction::CloseGroup));
        } else if tab > 0 {
            keys[TAB_SIZE + 1].set(NodeKind::Group, "Home", TOOLBAR_COLOR, false, Some(BoundAction::GoToRoot));
        }
        if tab + 1 < self.tabs {
            keys[TAB_SIZE + 2].set(NodeKind::Group, ">", TOOLBAR_COLOR, false, Some(BoundAction::NextTab));
        }
    }
}

fn bind_slot(store: &MacroStore, item: &NodeRef, key: &mut KeyIndicator) {
    let NodeRef::Id(id) = item else {
        return;
    };
    match store.get(id) {
        Some(MacroNode::Group { label, color, .. }) => {
            key.set(NodeKind::Group, label, *color, false, Some(BoundAction::OpenGroup(id.clone())))
        }
        Some(MacroNode::Macro {
            label,
            color,
            retrigger,
            ..
        }) => key.set(
            NodeKind::Macro,
            label,
            *color,
            *retrigger,
            Some(BoundAction::RunMacro(id.clone())),
        ),
        Some(MacroNode::Blank) => key.set(NodeKind::Blank, "", Rgb::BLACK, false, None),
        None => debug!("Node {} not found, key left blank", id.as_str()),
    }
}
