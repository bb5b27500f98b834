//! Channel-level patch tables
//!
//! A patch rewires individual DMX channels just before emission, the
//! on-site fix for a miswired or dead run: "whatever channel 1 shows,
//! channel 4 shows too". Rules copy bytes inside one universe and are
//! applied in declaration order to the emitter's send-copy, never to the
//! authoritative universe buffer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::PatchError;
use crate::universe::DMX_CHANNELS;

/// One channel rewrite: copy `src_channel`'s byte to `dst_channel` within
/// `universe`. Channels are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRule {
    /// Universe the rule applies to.
    pub universe: u16,
    /// Channel to read (1-based).
    #[serde(alias = "src")]
    pub src_channel: u16,
    /// Channel to overwrite (1-based).
    #[serde(alias = "dst")]
    pub dst_channel: u16,
}

/// Immutable, validated set of patch rules.
///
/// Rules are grouped per universe at build time so applying them is a
/// single linear pass over the universe's group. The `enabled` flag is a
/// snapshot-level seed; the runtime toggles patching through the control
/// plane without republishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSnapshot {
    rules: Vec<PatchRule>,
    // Zero-based (src, dst) pairs per universe, declaration order kept.
    by_universe: HashMap<u16, Vec<(u16, u16)>>,
    enabled: bool,
}

impl Default for PatchSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl PatchSnapshot {
    /// A snapshot with no rules, disabled.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            by_universe: HashMap::new(),
            enabled: false,
        }
    }

    /// Validate a rule list into a snapshot.
    ///
    /// Rejects channels outside `1..=512` and any directed cycle among the
    /// rules of one universe (including a rule copying a channel onto
    /// itself). Acyclic rules applied in declaration order give a
    /// well-defined result; a channel may still be the source of one rule
    /// and the destination of another.
    pub fn validate(rules: Vec<PatchRule>, enabled: bool) -> Result<Self, PatchError> {
        for rule in &rules {
            for channel in [rule.src_channel, rule.dst_channel] {
                if channel == 0 || channel as usize > DMX_CHANNELS {
                    return Err(PatchError::OutOfRange {
                        universe: rule.universe,
                        channel,
                    });
                }
            }
        }

        let mut by_universe: HashMap<u16, Vec<(u16, u16)>> = HashMap::new();
        for rule in &rules {
            by_universe
                .entry(rule.universe)
                .or_default()
                .push((rule.src_channel - 1, rule.dst_channel - 1));
        }

        for (&universe, pairs) in &by_universe {
            if let Some(channel) = find_cycle(pairs) {
                return Err(PatchError::Cycle {
                    universe,
                    channel: channel + 1,
                });
            }
        }

        Ok(Self {
            rules,
            by_universe,
            enabled,
        })
    }

    /// Whether the snapshot asks for patching to start enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The rules in declaration order.
    pub fn rules(&self) -> &[PatchRule] {
        &self.rules
    }

    /// Whether the snapshot rewrites anything at all.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the universe's rules to a frame, in declaration order.
    pub fn apply(&self, universe: u16, frame: &mut [u8; DMX_CHANNELS]) {
        let Some(pairs) = self.by_universe.get(&universe) else {
            return;
        };
        for &(src, dst) in pairs {
            frame[dst as usize] = frame[src as usize];
        }
    }
}

/// Depth-first cycle search over the channel graph of one universe.
/// Returns a zero-based channel on a cycle, if any.
fn find_cycle(pairs: &[(u16, u16)]) -> Option<u16> {
    let mut edges: HashMap<u16, Vec<u16>> = HashMap::new();
    for &(src, dst) in pairs {
        edges.entry(src).or_default().push(dst);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        InStack,
        Done,
    }

    let mut marks: HashMap<u16, Mark> = HashMap::new();

    fn visit(
        node: u16,
        edges: &HashMap<u16, Vec<u16>>,
        marks: &mut HashMap<u16, Mark>,
    ) -> Option<u16> {
        match marks.get(&node).copied().unwrap_or(Mark::New) {
            Mark::InStack => return Some(node),
            Mark::Done => return None,
            Mark::New => {}
        }
        marks.insert(node, Mark::InStack);
        if let Some(next) = edges.get(&node) {
            for &dst in next {
                if let Some(hit) = visit(dst, edges, marks) {
                    return Some(hit);
                }
            }
        }
        marks.insert(node, Mark::Done);
        None
    }

    for &(src, _) in pairs {
        if let Some(hit) = visit(src, &edges, &mut marks) {
            return Some(hit);
        }
    }
    None
}
