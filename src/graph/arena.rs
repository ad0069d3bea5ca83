//! Fixed-capacity storage for voice nodes and their single output wire.
//!
//! The arena has one bank per concurrently existing voice: the current voice
//! and a predecessor still inside its teardown window. Banks are claimed on
//! build and released when the voice is freed; the generation counter makes
//! stale `VoiceId`s detectable instead of silently reaching a reused bank.

use crate::graph::{
    chain::Node,
    node::{Input, ModDestination, NodeId, Slot, VoiceId},
};

/// Current voice plus one lingering predecessor.
pub const VOICE_BANKS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("{0} is already occupied")]
    Occupied(NodeId),
    #[error("{0} does not exist or was freed")]
    Disposed(NodeId),
    #[error("{voice} was already freed")]
    VoiceDisposed { voice: VoiceId },
    #[error("{node} is already connected to {input}")]
    AlreadyConnected { node: NodeId, input: Input },
    #[error("{0} is not connected")]
    NotConnected(NodeId),
    #[error("no free voice bank")]
    NoFreeBank,
}

struct Entry {
    node: Node,
    output: Option<Input>,
}

struct Bank {
    generation: u32,
    live: bool,
    entries: [Option<Entry>; Slot::COUNT],
}

impl Bank {
    fn new() -> Self {
        Self {
            generation: 0,
            live: false,
            entries: std::array::from_fn(|_| None),
        }
    }
}

pub struct NodeArena {
    banks: [Bank; VOICE_BANKS],
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            banks: std::array::from_fn(|_| Bank::new()),
        }
    }

    /// Claim an empty bank for a new voice.
    pub fn claim(&mut self) -> Result<VoiceId, GraphError> {
        let (index, bank) = self
            .banks
            .iter_mut()
            .enumerate()
            .find(|(_, bank)| !bank.live)
            .ok_or(GraphError::NoFreeBank)?;

        bank.generation = bank.generation.wrapping_add(1);
        bank.live = true;
        Ok(VoiceId {
            bank: index,
            generation: bank.generation,
        })
    }

    pub fn is_live(&self, voice: VoiceId) -> bool {
        self.banks
            .get(voice.bank)
            .is_some_and(|bank| bank.live && bank.generation == voice.generation)
    }

    /// Ids of every claimed bank.
    pub fn live_voices(&self) -> impl Iterator<Item = VoiceId> + '_ {
        self.banks.iter().enumerate().filter(|(_, bank)| bank.live).map(|(index, bank)| VoiceId {
            bank: index,
            generation: bank.generation,
        })
    }

    pub fn insert(&mut self, id: NodeId, node: Node) -> Result<(), GraphError> {
        let slot = self.slot_mut(id)?;
        if slot.is_some() {
            return Err(GraphError::Occupied(id));
        }
        *slot = Some(Entry { node, output: None });
        Ok(())
    }

    /// Wire `id`'s output to `input`. A node feeds at most one input.
    pub fn connect(&mut self, id: NodeId, input: Input) -> Result<(), GraphError> {
        let entry = self.entry_mut(id)?;
        if let Some(existing) = entry.output {
            return Err(GraphError::AlreadyConnected {
                node: id,
                input: existing,
            });
        }
        entry.output = Some(input);
        Ok(())
    }

    pub fn disconnect(&mut self, id: NodeId) -> Result<Input, GraphError> {
        self.entry_mut(id)?
            .output
            .take()
            .ok_or(GraphError::NotConnected(id))
    }

    /// Take the node out of its slot, dropping its connection.
    pub fn remove(&mut self, id: NodeId) -> Result<Node, GraphError> {
        self.slot_mut(id)?
            .take()
            .map(|entry| entry.node)
            .ok_or(GraphError::Disposed(id))
    }

    /// Free every node of `voice` and return the bank. Returns the number
    /// of nodes dropped.
    pub fn release(&mut self, voice: VoiceId) -> Result<usize, GraphError> {
        if !self.is_live(voice) {
            return Err(GraphError::VoiceDisposed { voice });
        }
        let bank = &mut self.banks[voice.bank];
        let freed = bank.entries.iter_mut().filter_map(Option::take).count();
        bank.live = false;
        Ok(freed)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.entry(id).map(|entry| &entry.node)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.entry_mut(id).ok().map(|entry| &mut entry.node)
    }

    pub fn output(&self, id: NodeId) -> Option<Input> {
        self.entry(id).and_then(|entry| entry.output)
    }

    /// Number of nodes a voice currently owns.
    pub fn node_count(&self, voice: VoiceId) -> usize {
        if !self.is_live(voice) {
            return 0;
        }
        self.banks[voice.bank].entries.iter().flatten().count()
    }

    /// Node and output wire for each occupied slot of a live voice.
    pub fn nodes_mut(&mut self, voice: VoiceId) -> impl Iterator<Item = (Slot, &mut Node, Option<Input>)> + '_ {
        let live = self.is_live(voice);
        let entries: &mut [Option<Entry>] = if live {
            &mut self.banks[voice.bank].entries[..]
        } else {
            &mut []
        };
        entries.iter_mut().enumerate().filter_map(|(index, entry)| {
            entry
                .as_mut()
                .map(|entry| (slot_from_index(index), &mut entry.node, entry.output))
        })
    }

    fn entry(&self, id: NodeId) -> Option<&Entry> {
        if !self.is_live(id.voice) {
            return None;
        }
        self.banks[id.voice.bank].entries[id.slot.index()].as_ref()
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut Entry, GraphError> {
        self.slot_mut(id)?.as_mut().ok_or(GraphError::Disposed(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Option<Entry>, GraphError> {
        if !self.is_live(id.voice) {
            return Err(GraphError::Disposed(id));
        }
        Ok(&mut self.banks[id.voice.bank].entries[id.slot.index()])
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

fn slot_from_index(index: usize) -> Slot {
    match index {
        0..=2 => Slot::Oscillator(index),
        3 => Slot::Noise,
        4 => Slot::Amp,
        5 => Slot::Lfo,
        _ => Slot::ModTap(ModDestination::ALL[(index - 6).min(3)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::chain::AmpStage;

    fn amp() -> Node {
        Node::Amp(AmpStage::new(0.0))
    }

    #[test]
    fn banks_are_limited_and_reusable() {
        let mut arena = NodeArena::new();
        let a = arena.claim().unwrap();
        let b = arena.claim().unwrap();
        assert_ne!(a, b);
        assert_eq!(arena.claim(), Err(GraphError::NoFreeBank));

        arena.release(a).unwrap();
        let c = arena.claim().unwrap();
        assert_eq!(c.bank, a.bank);
        assert_ne!(c, a, "reused bank gets a new generation");
        assert!(!arena.is_live(a));
        assert!(arena.is_live(c));
    }

    #[test]
    fn double_connect_is_rejected() {
        let mut arena = NodeArena::new();
        let voice = arena.claim().unwrap();
        let id = NodeId::new(voice, Slot::Amp);
        arena.insert(id, amp()).unwrap();

        arena.connect(id, Input::MainOut).unwrap();
        assert_eq!(
            arena.connect(id, Input::FilterIn),
            Err(GraphError::AlreadyConnected {
                node: id,
                input: Input::MainOut
            })
        );

        assert_eq!(arena.disconnect(id), Ok(Input::MainOut));
        assert_eq!(arena.disconnect(id), Err(GraphError::NotConnected(id)));
        arena.connect(id, Input::FilterIn).unwrap();
    }

    #[test]
    fn freed_nodes_cannot_be_touched() {
        let mut arena = NodeArena::new();
        let voice = arena.claim().unwrap();
        let id = NodeId::new(voice, Slot::Amp);
        arena.insert(id, amp()).unwrap();
        assert!(matches!(arena.insert(id, amp()), Err(GraphError::Occupied(_))));

        assert_eq!(arena.release(voice), Ok(1));
        assert_eq!(arena.connect(id, Input::MainOut), Err(GraphError::Disposed(id)));
        assert!(arena.get(id).is_none());
        assert_eq!(arena.release(voice), Err(GraphError::VoiceDisposed { voice }));
    }

    #[test]
    fn removed_slot_can_be_refilled() {
        let mut arena = NodeArena::new();
        let voice = arena.claim().unwrap();
        let id = NodeId::new(voice, Slot::Amp);
        arena.insert(id, amp()).unwrap();
        arena.connect(id, Input::MainOut).unwrap();

        assert!(arena.remove(id).is_ok());
        assert!(matches!(arena.remove(id), Err(GraphError::Disposed(_))));
        arena.insert(id, amp()).unwrap();
        assert_eq!(arena.output(id), None);
        assert_eq!(arena.node_count(voice), 1);
    }

    #[test]
    fn slot_indices_round_trip() {
        for index in 0..Slot::COUNT {
            assert_eq!(slot_from_index(index).index(), index);
        }
    }
}
