//! Speaking state of a call

/// Whether the assistant is idle or working on a reply.
///
/// `playback_started` flips once the first chunk of the reply has been
/// released to the caller; only then can caller speech interrupt it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeakingState {
    #[default]
    Listening,
    Replying {
        generation: u64,
        playback_started: bool,
    },
}

impl SpeakingState {
    pub fn is_listening(&self) -> bool {
        matches!(self, SpeakingState::Listening)
    }

    pub fn is_speaking(&self) -> bool {
        matches!(
            self,
            SpeakingState::Replying {
                playback_started: true,
                ..
            }
        )
    }

    pub fn generation(&self) -> Option<u64> {
        match self {
            SpeakingState::Listening => None,
            SpeakingState::Replying { generation, .. } => Some(*generation),
        }
    }
}

/// Point-in-time view of a session, published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: SpeakingState,
    /// Last generation number handed out
    pub generation: u64,
    /// Marks sent to the caller and not yet acknowledged
    pub outstanding_marks: usize,
}
