//! Engine configuration.

/// Settings a [`GraphEngine`](crate::GraphEngine) is created with.
///
/// ```
/// use klingt_graph::EngineConfig;
///
/// let config = EngineConfig::new(44_100)
///     .with_max_block_size(256)
///     .with_midi_capacity(512);
/// assert_eq!(config.sample_rate(), 44_100);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    sample_rate: u32,
    max_block_size: usize,
    midi_capacity: usize,
    message_queue_size: usize,
    command_queue_size: usize,
    node_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            max_block_size: 512,
            midi_capacity: 256,
            message_queue_size: 64,
            command_queue_size: 1024,
            node_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Defaults at the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Largest block rendered in one pass; longer host blocks are split.
    pub fn with_max_block_size(mut self, frames: usize) -> Self {
        self.max_block_size = frames.max(1);
        self
    }

    /// Event capacity of every MIDI buffer in the graph.
    pub fn with_midi_capacity(mut self, events: usize) -> Self {
        self.midi_capacity = events;
        self
    }

    /// Default parameter queue size of nodes added with
    /// [`add_node`](crate::GraphEngine::add_node).
    pub fn with_message_queue_size(mut self, messages: usize) -> Self {
        self.message_queue_size = messages.max(1);
        self
    }

    /// Capacity of the queues between the control and audio threads. Commands
    /// beyond it wait on the control thread until the next
    /// [`maintain`](crate::GraphEngine::maintain).
    pub fn with_command_queue_size(mut self, commands: usize) -> Self {
        self.command_queue_size = commands.max(1);
        self
    }

    /// Initial size of the audio thread's node table. It grows on demand.
    pub fn with_node_capacity(mut self, nodes: usize) -> Self {
        self.node_capacity = nodes;
        self
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    #[inline]
    pub fn midi_capacity(&self) -> usize {
        self.midi_capacity
    }

    #[inline]
    pub fn message_queue_size(&self) -> usize {
        self.message_queue_size
    }

    #[inline]
    pub fn command_queue_size(&self) -> usize {
        self.command_queue_size
    }

    #[inline]
    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    pub(crate) fn set_stream(&mut self, sample_rate: u32, max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size.max(1);
    }
}
