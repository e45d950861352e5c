use crate::Event;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleState {
    /// No connection exists; the next permitted attempt may open one.
    Absent,
    /// A connect request was handed to the transport, the handshake has not completed yet.
    Pending,
    /// The handshake completed and data may arrive.
    Active,
}

impl HandleState {
    /// Both [`HandleState::Pending`] and [`HandleState::Active`] block further connect attempts.
    pub fn is_present(&self) -> bool {
        !matches!(self, HandleState::Absent)
    }
}

pub trait Step<Input> {
    fn step(&mut self, input: Input) -> Option<HandleState>;
}

impl Step<&Event> for HandleState {
    fn step(&mut self, event: &Event) -> Option<HandleState> {
        match (self, event) {
            (HandleState::Pending, Event::Established) => {
                log::debug!("Connection established");
                Some(HandleState::Active)
            }
            (HandleState::Absent, Event::Established) => {
                log::warn!("Connection established without a pending attempt");
                Some(HandleState::Active)
            }
            (HandleState::Active, Event::Established) => {
                log::warn!("Received establishment of an already active connection");
                None
            }

            (HandleState::Active, Event::Receive(chunk)) => {
                log::trace!("Received {} bytes", chunk.len());
                None
            }
            (state, Event::Receive(chunk)) => {
                log::warn!("Received {} bytes while {state:?}", chunk.len());
                None
            }

            (HandleState::Absent, Event::Closed) => {
                log::trace!("Ignoring close of absent connection");
                None
            }
            (_, Event::Closed) => {
                log::info!("Connection closed");
                Some(HandleState::Absent)
            }

            (HandleState::Absent, Event::ConnectionError(reason)) => {
                log::debug!("Ignoring error of absent connection: {reason}");
                None
            }
            (_, Event::ConnectionError(reason)) => {
                log::error!("Connection error: {reason}");
                Some(HandleState::Absent)
            }
        }
    }
}
